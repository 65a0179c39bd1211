use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;

/// Shared Postgres handle for the booking tables. Seats are admitted in
/// Redis before any row is written, so only the durable half of a booking
/// ever queues on this pool; `max_connections` and the acquire timeout come
/// from configuration so a saturated database sheds load at the pool edge
/// instead of stacking request handlers behind it.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema under `migrations/`: users, the movie/studio/schedule
    /// catalog, then reservations and their seat rows.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("applying database migrations");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("database schema is up to date");
        Ok(())
    }
}
