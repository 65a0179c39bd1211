use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cinepass_domain::reservation::{HistoryRow, Reservation, ReservationStatus};
use cinepass_domain::store::{ReservationRepository, ScheduleGate, SeatLockStore};
use cinepass_domain::{Error, Result};
use tracing::warn;
use uuid::Uuid;

/// How long a compensating seat release may run after the request that
/// admitted the seats is already gone.
const ROLLBACK_DEADLINE: Duration = Duration::from_secs(2);

/// The booking protocol over the lock store and the durable store. Admission
/// goes through the lock store first; the durable row is written only once
/// admission is granted. Stateless, shared across all handlers.
pub struct ReservationEngine {
    reservations: Arc<dyn ReservationRepository>,
    seat_locks: Arc<dyn SeatLockStore>,
    schedules: Arc<dyn ScheduleGate>,
    hold_ttl: Duration,
}

impl ReservationEngine {
    pub fn new(
        reservations: Arc<dyn ReservationRepository>,
        seat_locks: Arc<dyn SeatLockStore>,
        schedules: Arc<dyn ScheduleGate>,
        hold_ttl: Duration,
    ) -> Self {
        Self {
            reservations,
            seat_locks,
            schedules,
            hold_ttl,
        }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        schedule_id: Uuid,
        seats: Vec<String>,
        total_price: i64,
    ) -> Result<Reservation> {
        if seats.is_empty() {
            return Err(Error::InvalidInput("at least one seat is required".into()));
        }
        if seats.iter().any(|s| s.trim().is_empty()) {
            return Err(Error::InvalidInput("seat codes cannot be blank".into()));
        }
        for (i, seat) in seats.iter().enumerate() {
            if seats[..i].contains(seat) {
                return Err(Error::InvalidInput(format!("duplicate seat code {seat}")));
            }
        }
        if total_price <= 0 {
            return Err(Error::InvalidInput("total price must be positive".into()));
        }

        let schedule = self
            .schedules
            .find_summary(schedule_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("schedule {schedule_id}")))?;
        if !schedule.is_active {
            return Err(Error::ScheduleInactive(schedule_id));
        }
        if Utc::now() >= schedule.starts_at {
            return Err(Error::ScheduleAlreadyStarted(schedule_id));
        }

        self.seat_locks
            .hold_seats(schedule_id, user_id, &seats, self.hold_ttl)
            .await?;

        // From here until the durable commit the seats are held but not
        // recorded. The guard releases them if the commit fails or the
        // request is canceled mid-flight; until then TTL is the backstop.
        let rollback = HoldRollback::arm(Arc::clone(&self.seat_locks), schedule_id, seats.clone());

        let hold_ttl = chrono::Duration::from_std(self.hold_ttl)
            .map_err(|e| Error::Internal(format!("hold ttl out of range: {e}")))?;
        let reservation = Reservation::pending(user_id, schedule_id, total_price, hold_ttl);

        self.reservations.create(&reservation, &seats).await?;
        rollback.disarm();

        self.reservations
            .find_by_id(reservation.id)
            .await?
            .ok_or_else(|| {
                Error::Inconsistency(format!("reservation {} vanished after create", reservation.id))
            })
    }

    pub async fn confirm(&self, id: Uuid) -> Result<Reservation> {
        let mut reservation = self.fetch(id).await?;

        if !reservation
            .status
            .can_transition_to(ReservationStatus::Paid)
        {
            return Err(Error::InvalidStateTransition {
                from: reservation.status,
                to: ReservationStatus::Paid,
            });
        }
        if Utc::now() > reservation.expires_at {
            // The reaper owns the EXPIRED transition and the lock cleanup.
            return Err(Error::Expired(id));
        }

        self.transition(id, ReservationStatus::Paid).await?;

        let seats = reservation.seat_codes();
        if let Err(err) = self
            .seat_locks
            .confirm_seats(reservation.schedule_id, &seats)
            .await
        {
            // The durable store is authoritative; a paid reservation is not
            // revocable by its cache. The seats are also owned by the PAID
            // row, so a later hold cannot collide with the missing entries.
            warn!(
                reservation = %id,
                schedule = %reservation.schedule_id,
                %err,
                "lock store confirm failed after durable write"
            );
        }

        reservation.status = ReservationStatus::Paid;
        reservation.updated_at = Utc::now();
        Ok(reservation)
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Reservation> {
        let mut reservation = self.fetch(id).await?;

        if !reservation
            .status
            .can_transition_to(ReservationStatus::Canceled)
        {
            return Err(Error::InvalidStateTransition {
                from: reservation.status,
                to: ReservationStatus::Canceled,
            });
        }

        self.transition(id, ReservationStatus::Canceled).await?;

        let seats = reservation.seat_codes();
        if let Err(err) = self
            .seat_locks
            .release_seats(reservation.schedule_id, &seats)
            .await
        {
            warn!(
                reservation = %id,
                schedule = %reservation.schedule_id,
                %err,
                "seat release failed after cancel; TTL will reclaim"
            );
        }

        reservation.status = ReservationStatus::Canceled;
        reservation.updated_at = Utc::now();
        Ok(reservation)
    }

    pub async fn get(&self, id: Uuid) -> Result<Reservation> {
        self.fetch(id).await
    }

    pub async fn history(&self, user_id: Uuid) -> Result<Vec<HistoryRow>> {
        self.reservations.history_for_user(user_id).await
    }

    async fn fetch(&self, id: Uuid) -> Result<Reservation> {
        self.reservations
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("reservation {id}")))
    }

    /// Compare-and-set from PENDING; when the row moved underneath us, name
    /// the state the loser actually observed.
    async fn transition(&self, id: Uuid, to: ReservationStatus) -> Result<()> {
        let touched = self
            .reservations
            .update_status(id, ReservationStatus::Pending, to)
            .await?;
        if touched == 0 {
            return match self.reservations.find_by_id(id).await? {
                None => Err(Error::NotFound(format!("reservation {id}"))),
                Some(current) => Err(Error::InvalidStateTransition {
                    from: current.status,
                    to,
                }),
            };
        }
        Ok(())
    }
}

/// Releases held seats on drop unless disarmed, detached from the admitting
/// request so cancellation cannot strand the hold until its TTL.
struct HoldRollback {
    seat_locks: Arc<dyn SeatLockStore>,
    schedule_id: Uuid,
    seats: Vec<String>,
    armed: bool,
}

impl HoldRollback {
    fn arm(seat_locks: Arc<dyn SeatLockStore>, schedule_id: Uuid, seats: Vec<String>) -> Self {
        Self {
            seat_locks,
            schedule_id,
            seats,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for HoldRollback {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let seat_locks = Arc::clone(&self.seat_locks);
        let schedule_id = self.schedule_id;
        let seats = std::mem::take(&mut self.seats);
        tokio::spawn(async move {
            match tokio::time::timeout(
                ROLLBACK_DEADLINE,
                seat_locks.release_seats(schedule_id, &seats),
            )
            .await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(
                    schedule = %schedule_id,
                    %err,
                    "compensating seat release failed; TTL will reclaim"
                ),
                Err(_) => warn!(
                    schedule = %schedule_id,
                    "compensating seat release timed out; TTL will reclaim"
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{InMemoryReservations, InMemorySchedules, InMemorySeatLocks};
    use chrono::Duration as ChronoDuration;

    const HOLD_TTL: Duration = Duration::from_secs(300);

    struct Harness {
        engine: ReservationEngine,
        reservations: Arc<InMemoryReservations>,
        seat_locks: Arc<InMemorySeatLocks>,
        schedules: Arc<InMemorySchedules>,
        schedule_id: Uuid,
    }

    fn harness() -> Harness {
        let reservations = Arc::new(InMemoryReservations::new());
        let seat_locks = Arc::new(InMemorySeatLocks::new());
        let schedules = Arc::new(InMemorySchedules::new());
        let schedule_id = schedules.add_upcoming();

        let engine = ReservationEngine::new(
            reservations.clone(),
            seat_locks.clone(),
            schedules.clone(),
            HOLD_TTL,
        );
        Harness {
            engine,
            reservations,
            seat_locks,
            schedules,
            schedule_id,
        }
    }

    fn seats(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn create_holds_seats_and_persists_pending() {
        let h = harness();
        let user = Uuid::new_v4();

        let reservation = h
            .engine
            .create(user, h.schedule_id, seats(&["A1", "A2"]), 40_000)
            .await
            .unwrap();

        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.seat_codes(), seats(&["A1", "A2"]));
        assert_eq!(
            reservation.expires_at - reservation.created_at,
            ChronoDuration::seconds(300)
        );

        let holds = h.seat_locks.held_seats(h.schedule_id).await.unwrap();
        assert_eq!(holds.get("A1"), Some(&user.to_string()));
        assert_eq!(holds.get("A2"), Some(&user.to_string()));
    }

    #[tokio::test]
    async fn validation_short_circuits_before_any_store_io() {
        let h = harness();
        let user = Uuid::new_v4();

        let err = h
            .engine
            .create(user, h.schedule_id, vec![], 100)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = h
            .engine
            .create(user, h.schedule_id, seats(&["A1", "  "]), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = h
            .engine
            .create(user, h.schedule_id, seats(&["A1"]), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        assert!(h.seat_locks.held_seats(h.schedule_id).await.unwrap().is_empty());
        assert_eq!(h.reservations.len(), 0);
    }

    #[tokio::test]
    async fn overlapping_create_loses_with_the_conflicting_seat() {
        let h = harness();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();

        h.engine
            .create(u1, h.schedule_id, seats(&["A1", "A2"]), 40_000)
            .await
            .unwrap();

        let err = h
            .engine
            .create(u2, h.schedule_id, seats(&["A2", "A3"]), 40_000)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SeatUnavailable(ref seat) if seat == "A2"));

        // The losing batch left no trace: A3 is still free for anyone.
        assert!(h
            .seat_locks
            .is_seat_available(h.schedule_id, "A3")
            .await
            .unwrap());
        let holds = h.seat_locks.held_seats(h.schedule_id).await.unwrap();
        assert_eq!(holds.len(), 2);
    }

    #[tokio::test]
    async fn inactive_or_started_schedules_are_rejected() {
        let h = harness();
        let user = Uuid::new_v4();

        let inactive = h.schedules.add_inactive();
        let err = h
            .engine
            .create(user, inactive, seats(&["A1"]), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ScheduleInactive(_)));

        let started = h.schedules.add_started();
        let err = h
            .engine
            .create(user, started, seats(&["A1"]), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ScheduleAlreadyStarted(_)));

        let err = h
            .engine
            .create(user, Uuid::new_v4(), seats(&["A1"]), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn durable_failure_releases_the_held_seats() {
        let h = harness();
        let user = Uuid::new_v4();

        h.reservations.fail_next_create();
        let err = h
            .engine
            .create(user, h.schedule_id, seats(&["B1", "B2"]), 20_000)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));

        // The compensating release runs detached; give it a beat.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.seat_locks.held_seats(h.schedule_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn confirm_promotes_the_hold_permanently() {
        let h = harness();
        let user = Uuid::new_v4();

        let reservation = h
            .engine
            .create(user, h.schedule_id, seats(&["C1"]), 20_000)
            .await
            .unwrap();

        let confirmed = h.engine.confirm(reservation.id).await.unwrap();
        assert_eq!(confirmed.status, ReservationStatus::Paid);

        // Seat stays owned with no TTL; a later create on it must lose.
        assert!(!h
            .seat_locks
            .is_seat_available(h.schedule_id, "C1")
            .await
            .unwrap());
        let err = h
            .engine
            .create(Uuid::new_v4(), h.schedule_id, seats(&["C1"]), 20_000)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SeatUnavailable(_)));
    }

    #[tokio::test]
    async fn second_transition_is_rejected_with_the_observed_state() {
        let h = harness();
        let user = Uuid::new_v4();

        let reservation = h
            .engine
            .create(user, h.schedule_id, seats(&["D1"]), 20_000)
            .await
            .unwrap();
        h.engine.confirm(reservation.id).await.unwrap();

        let err = h.engine.confirm(reservation.id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidStateTransition {
                from: ReservationStatus::Paid,
                to: ReservationStatus::Paid,
            }
        ));

        let err = h.engine.cancel(reservation.id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidStateTransition {
                from: ReservationStatus::Paid,
                to: ReservationStatus::Canceled,
            }
        ));
    }

    #[tokio::test]
    async fn confirm_past_the_deadline_reports_expired() {
        let h = harness();
        let user = Uuid::new_v4();

        let reservation = h
            .engine
            .create(user, h.schedule_id, seats(&["E1"]), 20_000)
            .await
            .unwrap();
        h.reservations
            .backdate_expiry(reservation.id, ChronoDuration::milliseconds(1));

        let err = h.engine.confirm(reservation.id).await.unwrap_err();
        assert!(matches!(err, Error::Expired(id) if id == reservation.id));

        // Still PENDING: only the reaper writes EXPIRED.
        let current = h.engine.get(reservation.id).await.unwrap();
        assert_eq!(current.status, ReservationStatus::Pending);
    }

    #[tokio::test]
    async fn cancel_returns_the_seats_to_the_pool() {
        let h = harness();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();

        let reservation = h
            .engine
            .create(u1, h.schedule_id, seats(&["B5"]), 20_000)
            .await
            .unwrap();
        let canceled = h.engine.cancel(reservation.id).await.unwrap();
        assert_eq!(canceled.status, ReservationStatus::Canceled);

        let rebooked = h
            .engine
            .create(u2, h.schedule_id, seats(&["B5"]), 20_000)
            .await
            .unwrap();
        assert_eq!(rebooked.status, ReservationStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_reservations_are_not_found() {
        let h = harness();
        let id = Uuid::new_v4();
        assert!(matches!(h.engine.get(id).await, Err(Error::NotFound(_))));
        assert!(matches!(h.engine.confirm(id).await, Err(Error::NotFound(_))));
        assert!(matches!(h.engine.cancel(id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn history_is_newest_first_with_original_seats() {
        let h = harness();
        let user = Uuid::new_v4();

        let first = h
            .engine
            .create(user, h.schedule_id, seats(&["F1"]), 10_000)
            .await
            .unwrap();
        let second = h
            .engine
            .create(user, h.schedule_id, seats(&["F2", "F3"]), 20_000)
            .await
            .unwrap();
        h.engine
            .create(Uuid::new_v4(), h.schedule_id, seats(&["F4"]), 10_000)
            .await
            .unwrap();

        let rows = h.engine.history(user).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, second.id);
        assert_eq!(rows[0].seats, seats(&["F2", "F3"]));
        assert_eq!(rows[1].id, first.id);
        assert_eq!(rows[1].seats, seats(&["F1"]));
    }
}
