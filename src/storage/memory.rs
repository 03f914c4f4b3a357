//! In-process reservation store.
//!
//! Every transaction holds the whole store exclusively from `begin` until
//! commit/rollback/drop, which makes it trivially serializable. Writes are staged
//! in the transaction and only become visible on commit. Used by the test suites,
//! where [`MemoryStore::failing_insert_at`] forces a failure in the middle of a
//! batch insert.

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{BookingTx, CancelOutcome, ReservationStore, StorageError};
use crate::models::{Movie, MovieId, Reservation, ReservationId, ReservationView, UserId};

#[derive(Default)]
struct MemoryState {
    users: BTreeSet<UserId>,
    movies: BTreeMap<MovieId, Movie>,
    rows: Vec<Reservation>,
    next_id: i64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> ReservationId {
        self.next_id += 1;
        ReservationId(self.next_id)
    }

    fn seat_taken(&self, movie_id: MovieId, date: &str, seat: &str) -> bool {
        self.rows
            .iter()
            .any(|r| r.is_active() && r.movie_id == movie_id && r.date == date && r.seat == seat)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_insert_at: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle over the same data whose batch inserts fail at seat index `n`.
    pub fn failing_insert_at(&self, n: usize) -> Self {
        Self {
            state: Arc::clone(&self.state),
            fail_insert_at: Some(n),
        }
    }

    pub async fn add_user(&self, user_id: UserId) {
        self.state.lock().await.users.insert(user_id);
    }

    pub async fn add_movie(&self, movie: Movie) {
        self.state.lock().await.movies.insert(movie.id, movie);
    }

    /// Every row ever committed, cancelled ones included.
    pub async fn reservations(&self) -> Vec<Reservation> {
        self.state.lock().await.rows.clone()
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: Vec<Reservation>,
    fail_insert_at: Option<usize>,
}

impl ReservationStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StorageError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(MemoryTx {
            guard,
            staged: Vec::new(),
            fail_insert_at: self.fail_insert_at,
        })
    }

    async fn user_exists(&self, user_id: UserId) -> Result<bool, StorageError> {
        Ok(self.state.lock().await.users.contains(&user_id))
    }

    async fn cancel(&self, id: ReservationId, user_id: UserId) -> Result<CancelOutcome, StorageError> {
        let mut state = self.state.lock().await;
        let Some(row) = state.rows.iter_mut().find(|r| r.id == id) else {
            return Ok(CancelOutcome::NotFound);
        };
        if row.user_id != user_id {
            return Ok(CancelOutcome::NotOwner);
        }
        if row.deleted_at.is_some() {
            return Ok(CancelOutcome::AlreadyCancelled);
        }
        row.deleted_at = Some(Utc::now());
        Ok(CancelOutcome::Cancelled)
    }

    async fn active_for_user(&self, user_id: UserId) -> Result<Vec<ReservationView>, StorageError> {
        let state = self.state.lock().await;
        let mut rows: Vec<ReservationView> = state
            .rows
            .iter()
            .filter(|r| r.user_id == user_id && r.is_active())
            .filter_map(|r| {
                let movie = state.movies.get(&r.movie_id)?;
                Some(ReservationView {
                    id: r.id,
                    movie_id: r.movie_id,
                    title: movie.title.clone(),
                    image_url: movie.image_url.clone(),
                    date: r.date.clone(),
                    seat: r.seat.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| (a.movie_id, &a.date, &a.seat).cmp(&(b.movie_id, &b.date, &b.seat)));
        Ok(rows)
    }
}

impl BookingTx for MemoryTx {
    async fn movie_exists(&mut self, movie_id: MovieId) -> Result<bool, StorageError> {
        Ok(self.guard.movies.contains_key(&movie_id))
    }

    // Транзакция и так держит всё хранилище
    async fn lock_seats(&mut self, _movie_id: MovieId, _date: &str, _seats: &[String]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn any_active(&mut self, movie_id: MovieId, date: &str, seats: &[String]) -> Result<bool, StorageError> {
        Ok(seats.iter().any(|seat| self.guard.seat_taken(movie_id, date, seat)))
    }

    async fn insert_all(
        &mut self,
        movie_id: MovieId,
        user_id: UserId,
        date: &str,
        seats: &[String],
    ) -> Result<Vec<Reservation>, StorageError> {
        // Те же CHECK-ограничения, что и в схеме Postgres
        if date.is_empty() {
            return Err(StorageError::Backend("reservation date must not be empty".to_string()));
        }
        let mut inserted = Vec::with_capacity(seats.len());
        for (i, seat) in seats.iter().enumerate() {
            if self.fail_insert_at == Some(i) {
                return Err(StorageError::Backend(format!("injected failure inserting seat {seat}")));
            }
            if seat.is_empty() {
                return Err(StorageError::Backend(format!("empty seat token at index {i}")));
            }
            let staged_dup = self
                .staged
                .iter()
                .any(|r| r.movie_id == movie_id && r.date == date && &r.seat == seat);
            if staged_dup || self.guard.seat_taken(movie_id, date, seat) {
                return Err(StorageError::UniqueViolation);
            }
            let row = Reservation {
                id: self.guard.allocate_id(),
                movie_id,
                user_id,
                date: date.to_string(),
                seat: seat.clone(),
                created_at: Utc::now(),
                deleted_at: None,
            };
            self.staged.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn commit(mut self) -> Result<(), StorageError> {
        let staged = std::mem::take(&mut self.staged);
        self.guard.rows.extend(staged);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StorageError> {
        Ok(())
    }
}
