use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The slice of a showtime the booking core needs: whether it can still be
/// booked, and when it starts. Everything else about schedules stays in the
/// catalog tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub id: Uuid,
    pub is_active: bool,
    pub starts_at: DateTime<Utc>,
}
