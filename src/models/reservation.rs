use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::collections::BTreeMap;

use super::{MovieId, ReservationId, UserId};

/// One booked seat. A row is never deleted: cancellation only sets `deleted_at`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub movie_id: MovieId,
    pub user_id: UserId,
    pub date: String,
    pub seat: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Active reservation joined with the movie it belongs to.
#[derive(Debug, Clone, FromRow)]
pub struct ReservationView {
    pub id: ReservationId,
    pub movie_id: MovieId,
    pub title: String,
    pub image_url: String,
    pub date: String,
    pub seat: String,
}

/// Seats of one user for one movie on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationBundle {
    pub movie_id: MovieId,
    pub title: String,
    pub image_url: String,
    pub date: String,
    pub seats: Vec<String>,
    pub reservation_ids: BTreeMap<String, ReservationId>,
}

/// Result of a committed booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookedSeats {
    pub date: String,
    pub seats: Vec<String>,
    pub reservation_ids: Vec<ReservationId>,
}
