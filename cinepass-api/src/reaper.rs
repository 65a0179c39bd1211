use std::sync::Arc;
use std::time::Duration;

use cinepass_domain::store::{ReservationRepository, SeatLockStore};
use cinepass_domain::Result;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Background task driving overdue PENDING reservations to EXPIRED and
/// releasing their seat holds. One instance per deployment; the batch
/// transition is idempotent, so an accidental second reaper is harmless.
pub async fn run(
    reservations: Arc<dyn ReservationRepository>,
    seat_locks: Arc<dyn SeatLockStore>,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval = ?every, "expiry reaper started");

    loop {
        ticker.tick().await;
        match sweep(reservations.as_ref(), seat_locks.as_ref()).await {
            Ok(0) => {}
            Ok(reaped) => info!(reaped, "expired overdue reservations"),
            Err(err) => error!(%err, "reaper sweep failed"),
        }
    }
}

/// One pass: snapshot the overdue rows, flip them durably, then release
/// their locks. The durable transition comes first so a racing Confirm
/// observes a terminal status before the seats become claimable again; a
/// failed release is tolerated because the hold TTL reclaims it anyway.
pub async fn sweep(
    reservations: &dyn ReservationRepository,
    seat_locks: &dyn SeatLockStore,
) -> Result<u64> {
    let overdue = reservations.find_expired().await?;
    if overdue.is_empty() {
        return Ok(0);
    }

    let reaped = reservations.mark_expired_batch().await?;

    for reservation in &overdue {
        let seats = reservation.seat_codes();
        if let Err(err) = seat_locks
            .release_seats(reservation.schedule_id, &seats)
            .await
        {
            warn!(
                reservation = %reservation.id,
                schedule = %reservation.schedule_id,
                %err,
                "failed to release seats for expired reservation; TTL will reclaim"
            );
        }
    }

    Ok(reaped)
}
