use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use tracing::debug;

use super::{BookingTx, CancelOutcome, ReservationStore, StorageError};
use crate::database::Database;
use crate::models::{MovieId, Reservation, ReservationId, ReservationView, User, UserId};

#[derive(Clone)]
pub struct PgReservationStore {
    db: Database,
}

impl PgReservationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

pub struct PgBookingTx {
    tx: Transaction<'static, Postgres>,
}

// Ключ advisory-блокировки места; коллизия хеша лишь сериализует лишнее
fn seat_lock_key(movie_id: MovieId, date: &str, seat: &str) -> String {
    format!("reservation:{}:{}:{}", movie_id, date, seat)
}

impl ReservationStore for PgReservationStore {
    type Tx = PgBookingTx;

    async fn begin(&self) -> Result<PgBookingTx, StorageError> {
        let tx = self.db.pool.begin().await?;
        Ok(PgBookingTx { tx })
    }

    async fn user_exists(&self, user_id: UserId) -> Result<bool, StorageError> {
        Ok(User::find_by_id(user_id, &self.db).await?.is_some())
    }

    async fn cancel(&self, id: ReservationId, user_id: UserId) -> Result<CancelOutcome, StorageError> {
        let mut tx = self.db.pool.begin().await?;

        // Блокируем строку, чтобы deleted_at выставлялся ровно один раз
        let row: Option<(UserId, Option<DateTime<Utc>>)> = sqlx::query_as(
            "SELECT user_id, deleted_at FROM reservation WHERE id = $1 FOR UPDATE"
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match row {
            None => CancelOutcome::NotFound,
            Some((owner, _)) if owner != user_id => CancelOutcome::NotOwner,
            Some((_, Some(_))) => CancelOutcome::AlreadyCancelled,
            Some((_, None)) => {
                sqlx::query(
                    "UPDATE reservation SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL"
                )
                .bind(id)
                .execute(&mut *tx)
                .await?;
                CancelOutcome::Cancelled
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn active_for_user(&self, user_id: UserId) -> Result<Vec<ReservationView>, StorageError> {
        let rows = sqlx::query_as::<_, ReservationView>(
            r#"
            SELECT r.id, r.movie_id, m.title, m.image_url, r.date, r.seat
            FROM reservation r
            JOIN movies m ON m.id = r.movie_id
            WHERE r.user_id = $1 AND r.deleted_at IS NULL
            ORDER BY r.movie_id, r.date, r.seat
            "#
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows)
    }
}

impl BookingTx for PgBookingTx {
    async fn movie_exists(&mut self, movie_id: MovieId) -> Result<bool, StorageError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM movies WHERE id = $1)"
        )
        .bind(movie_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn lock_seats(&mut self, movie_id: MovieId, date: &str, seats: &[String]) -> Result<(), StorageError> {
        // Один порядок захвата для всех транзакций - без дедлоков
        let mut keys: Vec<String> = seats
            .iter()
            .map(|seat| seat_lock_key(movie_id, date, seat))
            .collect();
        keys.sort();
        keys.dedup();

        for key in &keys {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(key)
                .execute(&mut *self.tx)
                .await?;
        }
        debug!("locked {} seat slot(s) for movie {} on {}", keys.len(), movie_id, date);
        Ok(())
    }

    async fn any_active(&mut self, movie_id: MovieId, date: &str, seats: &[String]) -> Result<bool, StorageError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
              SELECT 1
              FROM reservation
              WHERE movie_id = $1
                AND date = $2
                AND seat = ANY($3)
                AND deleted_at IS NULL
            )
            "#
        )
        .bind(movie_id)
        .bind(date)
        .bind(seats)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_all(
        &mut self,
        movie_id: MovieId,
        user_id: UserId,
        date: &str,
        seats: &[String],
    ) -> Result<Vec<Reservation>, StorageError> {
        // Одна команда на весь набор мест: либо все строки, либо ни одной
        let rows = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservation (movie_id, user_id, date, seat)
            SELECT $1, $2, $3, t.seat
            FROM UNNEST($4::text[]) WITH ORDINALITY AS t(seat, n)
            ORDER BY t.n
            RETURNING id, movie_id, user_id, date, seat, created_at, deleted_at
            "#
        )
        .bind(movie_id)
        .bind(user_id)
        .bind(date)
        .bind(seats)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn commit(self) -> Result<(), StorageError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StorageError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
