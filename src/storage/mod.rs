//! Storage collaborator for the reservation core.
//!
//! The core never talks to a connection pool directly. It opens a [`BookingTx`]
//! through a [`ReservationStore`] and relies on the store's isolation for the
//! one-active-reservation-per-seat guarantee:
//!
//! - [`postgres::PgReservationStore`] — per-seat transaction-scoped advisory locks
//!   plus a partial unique index on active rows.
//! - [`memory::MemoryStore`] — whole-transaction serialization, used in tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgReservationStore;

use std::future::Future;

use crate::models::{MovieId, Reservation, ReservationId, ReservationView, UserId};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    /// An active reservation for the same (movie, date, seat) already exists.
    #[error("active reservation already exists for seat")]
    UniqueViolation,
    #[error("transaction timed out")]
    Timeout,
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::UniqueViolation,
            _ => StorageError::Database(err),
        }
    }
}

/// What happened to a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyCancelled,
    NotFound,
    NotOwner,
}

pub trait ReservationStore: Clone + Send + Sync + 'static {
    type Tx: BookingTx;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StorageError>> + Send;

    /// Whether the token owner is a registered user.
    fn user_exists(&self, user_id: UserId) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Sets the cancellation timestamp of a reservation owned by `user_id`.
    /// An already cancelled row keeps its original timestamp.
    fn cancel(
        &self,
        id: ReservationId,
        user_id: UserId,
    ) -> impl Future<Output = Result<CancelOutcome, StorageError>> + Send;

    /// Active reservations of a user joined with movie metadata,
    /// ordered by movie, date and seat.
    fn active_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<ReservationView>, StorageError>> + Send;
}

/// A booking unit of work. Dropping it without [`BookingTx::commit`] discards
/// every write made through it.
pub trait BookingTx: Send {
    fn movie_exists(
        &mut self,
        movie_id: MovieId,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Blocks until this transaction exclusively holds every (movie, date, seat)
    /// slot. Held until commit or rollback.
    fn lock_seats(
        &mut self,
        movie_id: MovieId,
        date: &str,
        seats: &[String],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// True if any of `seats` has an active (non-cancelled) reservation for the slot.
    fn any_active(
        &mut self,
        movie_id: MovieId,
        date: &str,
        seats: &[String],
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn insert_all(
        &mut self,
        movie_id: MovieId,
        user_id: UserId,
        date: &str,
        seats: &[String],
    ) -> impl Future<Output = Result<Vec<Reservation>, StorageError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), StorageError>> + Send;
}
