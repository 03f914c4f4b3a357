//! reservation.rs
//!
//! Reservation core: validation, conflict check + atomic commit, cancellation
//! and per-user aggregation.
//!
//! A booking runs as one unit of work against the store:
//! 1. the movie must exist;
//! 2. every requested (movie, date, seat) slot is locked for the transaction;
//! 3. any active reservation on those slots aborts with `SeatConflict`;
//! 4. all seats are inserted in one batch and committed.
//!
//! Any failure after `begin` rolls the transaction back, so a partial seat set is
//! never visible. Mutual exclusion comes only from the store; nothing here holds
//! in-process locks or caches reservation state between requests.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::ReservationError;
use crate::models::{
    BookedSeats, MovieId, Reservation, ReservationBundle, ReservationId, ReservationView, UserId,
};
use crate::storage::{BookingTx, CancelOutcome, ReservationStore, StorageError};

pub const MAX_SEATS_PER_RESERVATION: usize = 5;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub seats: Vec<String>,
    #[serde(default)]
    pub date: String,
}

/// Structural checks only; date format and seat shape are left to the caller.
pub fn validate_booking(seats: &[String], date: &str) -> Result<(), ReservationError> {
    if seats.is_empty() || date.is_empty() {
        return Err(ReservationError::InvalidRequest("date and seat are required"));
    }
    if seats.len() > MAX_SEATS_PER_RESERVATION {
        return Err(ReservationError::InvalidRequest("max 5 seats per reservation"));
    }
    Ok(())
}

/// Drops repeated seat tokens, keeping first-occurrence order.
pub fn dedup_seats(seats: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(seats.len());
    let mut unique = Vec::with_capacity(seats.len());
    for seat in seats {
        if seen.insert(seat.as_str()) {
            unique.push(seat.clone());
        }
    }
    unique
}

/// Groups active reservations by movie id, then by date. Seats inside a bundle
/// are sorted; bundles of one movie are ordered by date.
pub fn bundle_reservations(rows: Vec<ReservationView>) -> BTreeMap<MovieId, Vec<ReservationBundle>> {
    let mut by_slot: BTreeMap<(MovieId, String), ReservationBundle> = BTreeMap::new();
    for row in rows {
        let bundle = by_slot
            .entry((row.movie_id, row.date.clone()))
            .or_insert_with(|| ReservationBundle {
                movie_id: row.movie_id,
                title: row.title.clone(),
                image_url: row.image_url.clone(),
                date: row.date.clone(),
                seats: Vec::new(),
                reservation_ids: BTreeMap::new(),
            });
        bundle.reservation_ids.insert(row.seat.clone(), row.id);
        bundle.seats.push(row.seat);
    }

    let mut by_movie: BTreeMap<MovieId, Vec<ReservationBundle>> = BTreeMap::new();
    for ((movie_id, _), mut bundle) in by_slot {
        bundle.seats.sort();
        bundle.seats.dedup();
        by_movie.entry(movie_id).or_default().push(bundle);
    }
    by_movie
}

// Нарушение уникального индекса = кто-то успел занять место
fn conflict_on_unique(err: StorageError) -> ReservationError {
    match err {
        StorageError::UniqueViolation => ReservationError::SeatConflict,
        other => ReservationError::Storage(other),
    }
}

#[derive(Clone)]
pub struct ReservationService<S> {
    store: S,
    timeout: Duration,
}

impl<S: ReservationStore> ReservationService<S> {
    pub fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Books every requested seat for `movie_id` on `request.date`, or none.
    pub async fn book(
        &self,
        user_id: UserId,
        movie_id: MovieId,
        request: BookingRequest,
    ) -> Result<BookedSeats, ReservationError> {
        validate_booking(&request.seats, &request.date)?;
        let seats = dedup_seats(&request.seats);

        // По таймауту future транзакции дропается, незакоммиченное откатывается
        match tokio::time::timeout(self.timeout, self.book_in_tx(user_id, movie_id, &request.date, &seats)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "booking for movie {} on {} by user {} timed out after {:?}",
                    movie_id, request.date, user_id, self.timeout
                );
                Err(StorageError::Timeout.into())
            }
        }
    }

    async fn book_in_tx(
        &self,
        user_id: UserId,
        movie_id: MovieId,
        date: &str,
        seats: &[String],
    ) -> Result<BookedSeats, ReservationError> {
        let mut tx = self.store.begin().await?;

        let rows = match check_and_insert(&mut tx, user_id, movie_id, date, seats).await {
            Ok(rows) => rows,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!("rollback failed for movie {} on {}: {:?}", movie_id, date, rollback_err);
                }
                if matches!(err, ReservationError::SeatConflict) {
                    warn!("seat conflict for movie {} on {}: {:?}", movie_id, date, seats);
                }
                return Err(err);
            }
        };

        tx.commit().await.map_err(conflict_on_unique)?;

        info!(
            "user {} reserved {} seat(s) for movie {} on {}",
            user_id,
            rows.len(),
            movie_id,
            date
        );

        let reservation_ids = seats
            .iter()
            .filter_map(|seat| rows.iter().find(|r| &r.seat == seat).map(|r| r.id))
            .collect();

        Ok(BookedSeats {
            date: date.to_string(),
            seats: seats.to_vec(),
            reservation_ids,
        })
    }

    /// Cancels a reservation owned by `user_id`. Cancelling twice succeeds twice
    /// and keeps the first cancellation timestamp.
    pub async fn cancel(&self, user_id: UserId, id: ReservationId) -> Result<(), ReservationError> {
        match self.store.cancel(id, user_id).await? {
            CancelOutcome::Cancelled => {
                info!("user {} cancelled reservation {}", user_id, id);
                Ok(())
            }
            CancelOutcome::AlreadyCancelled => {
                debug!("reservation {} already cancelled", id);
                Ok(())
            }
            CancelOutcome::NotFound => Err(ReservationError::ReservationNotFound(id)),
            CancelOutcome::NotOwner => {
                warn!("user {} tried to cancel reservation {} of another user", user_id, id);
                Err(ReservationError::NotOwner(id))
            }
        }
    }

    /// Владелец токена должен быть зарегистрирован.
    pub async fn is_registered(&self, user_id: UserId) -> Result<bool, ReservationError> {
        Ok(self.store.user_exists(user_id).await?)
    }

    pub async fn list(&self, user_id: UserId) -> Result<BTreeMap<MovieId, Vec<ReservationBundle>>, ReservationError> {
        let rows = self.store.active_for_user(user_id).await?;
        Ok(bundle_reservations(rows))
    }
}

async fn check_and_insert<T: BookingTx>(
    tx: &mut T,
    user_id: UserId,
    movie_id: MovieId,
    date: &str,
    seats: &[String],
) -> Result<Vec<Reservation>, ReservationError> {
    if !tx.movie_exists(movie_id).await? {
        return Err(ReservationError::MovieNotFound(movie_id));
    }

    tx.lock_seats(movie_id, date, seats).await?;

    if tx.any_active(movie_id, date, seats).await? {
        return Err(ReservationError::SeatConflict);
    }

    tx.insert_all(movie_id, user_id, date, seats)
        .await
        .map_err(conflict_on_unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seats(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn view(id: i64, movie: i64, title: &str, date: &str, seat: &str) -> ReservationView {
        ReservationView {
            id: ReservationId(id),
            movie_id: MovieId(movie),
            title: title.to_string(),
            image_url: format!("https://img.example/{movie}.jpg"),
            date: date.to_string(),
            seat: seat.to_string(),
        }
    }

    #[test]
    fn rejects_empty_seat_list() {
        let err = validate_booking(&[], "2024-05-01").unwrap_err();
        assert_eq!(err.to_string(), "date and seat are required");
    }

    #[test]
    fn rejects_empty_date() {
        let err = validate_booking(&seats(&["A1"]), "").unwrap_err();
        assert_eq!(err.to_string(), "date and seat are required");
    }

    #[test]
    fn rejects_six_seats() {
        let err = validate_booking(&seats(&["A1", "A2", "A3", "A4", "A5", "A6"]), "2024-05-01").unwrap_err();
        assert_eq!(err.to_string(), "max 5 seats per reservation");
    }

    #[test]
    fn accepts_five_seats() {
        assert!(validate_booking(&seats(&["A1", "A2", "A3", "A4", "A5"]), "2024-05-01").is_ok());
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        assert_eq!(dedup_seats(&seats(&["B2", "A1", "B2", "A1", "C3"])), seats(&["B2", "A1", "C3"]));
    }

    #[test]
    fn bundles_seats_of_one_movie_and_date() {
        let rows = vec![
            view(2, 7, "Alien", "2024-05-01", "A2"),
            view(1, 7, "Alien", "2024-05-01", "A1"),
        ];
        let bundles = bundle_reservations(rows);
        assert_eq!(bundles.len(), 1);
        let alien = &bundles[&MovieId(7)];
        assert_eq!(alien.len(), 1);
        assert_eq!(alien[0].seats, seats(&["A1", "A2"]));
        assert_eq!(alien[0].reservation_ids["A1"], ReservationId(1));
        assert_eq!(alien[0].reservation_ids["A2"], ReservationId(2));
    }

    #[test]
    fn same_title_different_movies_stay_apart() {
        let rows = vec![
            view(1, 7, "Solaris", "2024-05-01", "A1"),
            view(2, 8, "Solaris", "2024-05-01", "A1"),
        ];
        let bundles = bundle_reservations(rows);
        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[&MovieId(7)][0].seats, seats(&["A1"]));
        assert_eq!(bundles[&MovieId(8)][0].seats, seats(&["A1"]));
    }

    #[test]
    fn separate_dates_make_separate_bundles() {
        let rows = vec![
            view(1, 7, "Alien", "2024-05-02", "A1"),
            view(2, 7, "Alien", "2024-05-01", "A1"),
        ];
        let alien = &bundle_reservations(rows)[&MovieId(7)];
        assert_eq!(alien.len(), 2);
        assert_eq!(alien[0].date, "2024-05-01");
        assert_eq!(alien[1].date, "2024-05-02");
    }

    proptest! {
        #[test]
        fn seat_count_bounds(count in 0usize..12, date in "[0-9]{4}-[0-9]{2}-[0-9]{2}") {
            let list: Vec<String> = (0..count).map(|i| format!("R{i}")).collect();
            let result = validate_booking(&list, &date);
            prop_assert_eq!(result.is_ok(), (1..=MAX_SEATS_PER_RESERVATION).contains(&count));
        }

        #[test]
        fn dedup_never_grows_and_has_no_repeats(list in proptest::collection::vec("[A-C][1-3]", 0..8)) {
            let out = dedup_seats(&list);
            prop_assert!(out.len() <= list.len());
            let unique: HashSet<&String> = out.iter().collect();
            prop_assert_eq!(unique.len(), out.len());
        }
    }
}
