use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinepass_domain::schedule::ScheduleSummary;
use cinepass_domain::store::ScheduleGate;
use cinepass_domain::{Error, Result};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::Database;

/// Read-only lookup the reservation engine uses to gate bookings; schedule
/// writes belong to the catalog side and never pass through here.
pub struct PgScheduleGate {
    db: Database,
}

impl PgScheduleGate {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct ScheduleRow {
    id: Uuid,
    is_active: bool,
    starts_at: DateTime<Utc>,
}

#[async_trait]
impl ScheduleGate for PgScheduleGate {
    async fn find_summary(&self, schedule_id: Uuid) -> Result<Option<ScheduleSummary>> {
        let row: Option<ScheduleRow> = sqlx::query_as(
            r#"
            SELECT id, is_active, starts_at
            FROM schedules
            WHERE id = $1
            "#,
        )
        .bind(schedule_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(Error::database)?;

        Ok(row.map(|r| ScheduleSummary {
            id: r.id,
            is_active: r.is_active,
            starts_at: r.starts_at,
        }))
    }
}
