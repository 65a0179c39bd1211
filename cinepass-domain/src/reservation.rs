use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Paid,
    Canceled,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Paid => "PAID",
            ReservationStatus::Canceled => "CANCELED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ReservationStatus::Pending),
            "PAID" => Some(ReservationStatus::Paid),
            "CANCELED" => Some(ReservationStatus::Canceled),
            "EXPIRED" => Some(ReservationStatus::Expired),
            _ => None,
        }
    }

    /// PENDING may move to any terminal state; terminal states admit nothing.
    pub fn can_transition_to(self, to: ReservationStatus) -> bool {
        match self {
            ReservationStatus::Pending => matches!(
                to,
                ReservationStatus::Paid | ReservationStatus::Canceled | ReservationStatus::Expired
            ),
            ReservationStatus::Paid | ReservationStatus::Canceled | ReservationStatus::Expired => {
                false
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        self != ReservationStatus::Pending
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub schedule_id: Uuid,
    pub total_price: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub seats: Vec<ReservationSeat>,
}

impl Reservation {
    /// A fresh PENDING reservation whose hold deadline is `hold_ttl` from now.
    pub fn pending(
        user_id: Uuid,
        schedule_id: Uuid,
        total_price: i64,
        hold_ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Reservation {
            id: Uuid::new_v4(),
            user_id,
            schedule_id,
            total_price,
            status: ReservationStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: now + hold_ttl,
            seats: Vec::new(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && now > self.expires_at
    }

    pub fn seat_codes(&self) -> Vec<String> {
        self.seats.iter().map(|s| s.seat_code.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationSeat {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub seat_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationSeat {
    pub fn new(reservation_id: Uuid, seat_code: impl Into<String>) -> Self {
        let now = Utc::now();
        ReservationSeat {
            id: Uuid::new_v4(),
            reservation_id,
            seat_code: seat_code.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One row of a user's booking history: the reservation joined with its
/// schedule, movie and studio, plus the flattened seat list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRow {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub total_price: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub movie_title: String,
    pub movie_genre: String,
    pub studio_name: String,
    pub studio_location: String,
    pub seats: Vec<String>,
}
