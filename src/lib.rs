pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;

use std::sync::Arc;

use services::ReservationService;
use storage::{PgReservationStore, ReservationStore};

// Shared state для всего приложения; хранилище передаётся явно, глобальных данных нет
#[derive(Clone)]
pub struct AppState<S = PgReservationStore> {
    pub config: config::Config,
    pub reservations: ReservationService<S>,
}

impl AppState<PgReservationStore> {
    /// Пул, миграции и сервис бронирования поверх Postgres.
    pub async fn new(config: config::Config) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let db = database::Database::connect(&config.database).await?;
        db.migrate().await?;

        Ok(Arc::new(Self::with_store(PgReservationStore::new(db), config)))
    }
}

impl<S: ReservationStore> AppState<S> {
    pub fn with_store(store: S, config: config::Config) -> Self {
        let reservations = ReservationService::new(store, config.booking.timeout());
        Self { config, reservations }
    }
}
