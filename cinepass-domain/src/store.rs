use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::reservation::{HistoryRow, Reservation, ReservationStatus};
use crate::schedule::ScheduleSummary;
use crate::session::Session;
use crate::user::User;
use crate::Result;

/// Durable reservation records. Multi-row writes run in one transaction;
/// nothing here enforces the state machine, the engine does.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Insert the reservation and one row per seat, atomically.
    async fn create(&self, reservation: &Reservation, seats: &[String]) -> Result<()>;

    /// Single-row compare-and-set on status. Returns the number of rows
    /// touched; zero means the reservation does not exist or is no longer in
    /// `from`, so concurrent Confirm/Cancel serialize here: exactly one
    /// transition lands.
    async fn update_status(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<u64>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Reservation>>;

    /// All PENDING reservations whose deadline has passed, seats attached.
    async fn find_expired(&self) -> Result<Vec<Reservation>>;

    /// One statement flipping every overdue PENDING row to EXPIRED.
    async fn mark_expired_batch(&self) -> Result<u64>;

    /// The user's reservations joined with schedule, movie and studio,
    /// newest first.
    async fn history_for_user(&self, user_id: Uuid) -> Result<Vec<HistoryRow>>;
}

/// Expiry-aware seat ownership per showtime. This store is the only
/// authority on whether a seat is currently claimable; `hold_seats` and
/// `confirm_seats` must be atomic over the whole batch.
#[async_trait]
pub trait SeatLockStore: Send + Sync {
    /// All-or-nothing admission: every seat becomes held by `user_id` for at
    /// least `ttl`, or none does and the first conflicting seat is reported
    /// via `Error::SeatUnavailable`.
    async fn hold_seats(
        &self,
        schedule_id: Uuid,
        user_id: Uuid,
        seats: &[String],
        ttl: Duration,
    ) -> Result<()>;

    /// Drop held seats. Idempotent; unknown seats are ignored.
    async fn release_seats(&self, schedule_id: Uuid, seats: &[String]) -> Result<()>;

    /// Promote held seats to the permanent confirmed set, preserving the
    /// holder. Returns how many were actually moved.
    async fn confirm_seats(&self, schedule_id: Uuid, seats: &[String]) -> Result<u64>;

    /// Advisory check; admission must go through `hold_seats`.
    async fn is_seat_available(&self, schedule_id: Uuid, seat: &str) -> Result<bool>;

    /// Snapshot of current holds, seat code -> holder user id.
    async fn held_seats(&self, schedule_id: Uuid) -> Result<HashMap<String, String>>;
}

/// Token-keyed session records with TTL.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, token: &str, session: &Session, ttl: Duration) -> Result<()>;

    async fn get(&self, token: &str) -> Result<Option<Session>>;

    async fn delete(&self, token: &str) -> Result<()>;

    /// Move a session to a new token in one step, refreshing its TTL.
    /// Returns the session, or `None` when the old token is unknown.
    async fn rotate(&self, old_token: &str, new_token: &str, ttl: Duration)
        -> Result<Option<Session>>;
}

/// Read-only view of the showtime catalog, just enough to gate bookings.
#[async_trait]
pub trait ScheduleGate: Send + Sync {
    async fn find_summary(&self, schedule_id: Uuid) -> Result<Option<ScheduleSummary>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: &User) -> Result<()>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
}
