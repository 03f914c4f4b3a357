pub mod reservations;

use axum::Router;
use std::sync::Arc;

use crate::storage::ReservationStore;
use crate::AppState;

pub fn routes<S: ReservationStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .merge(reservations::routes())
}
