//! reservations.rs
//!
//! HTTP-обвязка ядра бронирования:
//! - `POST /movie/{id}/reserve` - забронировать до 5 мест на дату;
//! - `GET /user/reservations` - активные брони пользователя по фильмам;
//! - `DELETE /user/reservations/{id}` - отменить свою бронь.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::ReservationError;
use crate::middleware::AuthUser;
use crate::models::{MovieId, ReservationId};
use crate::services::BookingRequest;
use crate::storage::ReservationStore;
use crate::AppState;

pub fn routes<S: ReservationStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/movie/{id}/reserve", post(reserve_movie::<S>))
        .route("/user/reservations", get(get_reservations::<S>))
        .route("/user/reservations/{id}", delete(cancel_reservation::<S>))
}

// POST /movie/{id}/reserve
async fn reserve_movie<S: ReservationStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(movie_id): Path<i64>,
    body: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Response> {
    let Json(req) = body.map_err(|e| {
        tracing::debug!("reserve_movie bad body: {}", e);
        (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid json" }))).into_response()
    })?;

    let booked = state
        .reservations
        .book(user.user_id, MovieId(movie_id), req)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok((StatusCode::OK, Json(booked)))
}

// GET /user/reservations
async fn get_reservations<S: ReservationStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ReservationError> {
    let reservations = state.reservations.list(user.user_id).await?;
    Ok((StatusCode::OK, Json(json!({ "reservations": reservations }))))
}

// DELETE /user/reservations/{id}
async fn cancel_reservation<S: ReservationStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(reservation_id): Path<i64>,
) -> Result<impl IntoResponse, ReservationError> {
    state
        .reservations
        .cancel(user.user_id, ReservationId(reservation_id))
        .await?;
    Ok((StatusCode::OK, Json(json!({ "message": "reservation canceled" }))))
}
