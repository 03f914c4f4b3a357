//! Пул соединений Postgres и миграции схемы бронирования.

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::config::DatabaseConfig;

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    /// Открывает пул по настройкам `DATABASE_URL` / `DB_POOL_SIZE` / `DB_ACQUIRE_TIMEOUT_MS`.
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.pool_size)
            .acquire_timeout(cfg.acquire_timeout())
            .connect(&cfg.url)
            .await?;

        info!(
            "postgres pool ready: max {} connections, acquire timeout {:?}",
            cfg.pool_size,
            cfg.acquire_timeout()
        );
        Ok(Self { pool })
    }

    // Таблицы users/movies/reservation и частичный уникальный индекс по активным местам
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("reservation schema is up to date");
        Ok(())
    }
}
