use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::{MovieId, ReservationId};
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    /// Malformed client input, rejected before any storage access.
    #[error("{0}")]
    InvalidRequest(&'static str),
    #[error("movie {0} not found")]
    MovieNotFound(MovieId),
    /// Another active reservation holds at least one requested seat.
    #[error("seat already reserved")]
    SeatConflict,
    #[error("reservation {0} not found")]
    ReservationNotFound(ReservationId),
    #[error("reservation {0} belongs to another user")]
    NotOwner(ReservationId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReservationError {
    pub fn status(&self) -> StatusCode {
        match self {
            ReservationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ReservationError::MovieNotFound(_) | ReservationError::ReservationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ReservationError::SeatConflict => StatusCode::CONFLICT,
            ReservationError::NotOwner(_) => StatusCode::UNAUTHORIZED,
            ReservationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Детали ошибок хранилища только в лог, клиенту общий текст
    fn public_message(&self) -> String {
        match self {
            ReservationError::Storage(_) => "an error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ReservationError {
    fn into_response(self) -> Response {
        if let ReservationError::Storage(err) = &self {
            tracing::error!("reservation storage failure: {:?}", err);
        }
        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}
