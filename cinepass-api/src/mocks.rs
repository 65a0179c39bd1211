//! In-memory implementations of the store traits, enough to drive the
//! engine, the reaper and the HTTP surface without Postgres or Redis.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use cinepass_domain::reservation::{HistoryRow, Reservation, ReservationSeat, ReservationStatus};
use cinepass_domain::schedule::ScheduleSummary;
use cinepass_domain::session::Session;
use cinepass_domain::store::{
    ReservationRepository, ScheduleGate, SeatLockStore, SessionStore, UserRepository,
};
use cinepass_domain::user::User;
use cinepass_domain::{Error, Result};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryReservations {
    rows: Mutex<HashMap<Uuid, (u64, Reservation)>>,
    seq: AtomicU64,
    fail_next_create: AtomicBool,
}

impl InMemoryReservations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next `create` fail as if the database were down.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Push a reservation's deadline into the past by `by`.
    pub fn backdate_expiry(&self, id: Uuid, by: ChronoDuration) {
        let mut rows = self.rows.lock().unwrap();
        if let Some((_, r)) = rows.get_mut(&id) {
            r.expires_at = Utc::now() - by;
        }
    }
}

#[async_trait]
impl ReservationRepository for InMemoryReservations {
    async fn create(&self, reservation: &Reservation, seats: &[String]) -> Result<()> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(Error::Database("injected create failure".into()));
        }

        let mut stored = reservation.clone();
        stored.seats = seats
            .iter()
            .map(|code| ReservationSeat::new(reservation.id, code.clone()))
            .collect();

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().insert(stored.id, (seq, stored));
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some((_, r)) if r.status == from => {
                r.status = to;
                r.updated_at = Utc::now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Reservation>> {
        Ok(self.rows.lock().unwrap().get(&id).map(|(_, r)| r.clone()))
    }

    async fn find_expired(&self) -> Result<Vec<Reservation>> {
        let now = Utc::now();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|(_, r)| r.status == ReservationStatus::Pending && r.expires_at < now)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn mark_expired_batch(&self) -> Result<u64> {
        let now = Utc::now();
        let mut flipped = 0;
        for (_, r) in self.rows.lock().unwrap().values_mut() {
            if r.status == ReservationStatus::Pending && r.expires_at < now {
                r.status = ReservationStatus::Expired;
                r.updated_at = now;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn history_for_user(&self, user_id: Uuid) -> Result<Vec<HistoryRow>> {
        let rows = self.rows.lock().unwrap();
        let mut mine: Vec<&(u64, Reservation)> =
            rows.values().filter(|(_, r)| r.user_id == user_id).collect();
        mine.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(mine
            .into_iter()
            .map(|(_, r)| HistoryRow {
                id: r.id,
                schedule_id: r.schedule_id,
                total_price: r.total_price,
                status: r.status,
                created_at: r.created_at,
                expires_at: r.expires_at,
                starts_at: r.created_at + ChronoDuration::hours(1),
                ends_at: r.created_at + ChronoDuration::hours(3),
                movie_title: "movie".into(),
                movie_genre: "genre".into(),
                studio_name: "studio".into(),
                studio_location: "location".into(),
                seats: r.seat_codes(),
            })
            .collect())
    }
}

#[derive(Default)]
struct ScheduleLocks {
    holds: HashMap<String, (String, Instant)>,
    confirmed: HashMap<String, String>,
}

#[derive(Default)]
pub struct InMemorySeatLocks {
    schedules: Mutex<HashMap<Uuid, ScheduleLocks>>,
}

impl InMemorySeatLocks {
    pub fn new() -> Self {
        Self::default()
    }
}

fn purge_expired(locks: &mut ScheduleLocks) {
    let now = Instant::now();
    locks.holds.retain(|_, (_, deadline)| *deadline > now);
}

#[async_trait]
impl SeatLockStore for InMemorySeatLocks {
    async fn hold_seats(
        &self,
        schedule_id: Uuid,
        user_id: Uuid,
        seats: &[String],
        ttl: Duration,
    ) -> Result<()> {
        let mut schedules = self.schedules.lock().unwrap();
        let locks = schedules.entry(schedule_id).or_default();
        purge_expired(locks);

        for seat in seats {
            if locks.holds.contains_key(seat) || locks.confirmed.contains_key(seat) {
                return Err(Error::SeatUnavailable(seat.clone()));
            }
        }

        let deadline = Instant::now() + ttl;
        for seat in seats {
            locks
                .holds
                .insert(seat.clone(), (user_id.to_string(), deadline));
        }
        Ok(())
    }

    async fn release_seats(&self, schedule_id: Uuid, seats: &[String]) -> Result<()> {
        let mut schedules = self.schedules.lock().unwrap();
        if let Some(locks) = schedules.get_mut(&schedule_id) {
            for seat in seats {
                locks.holds.remove(seat);
            }
        }
        Ok(())
    }

    async fn confirm_seats(&self, schedule_id: Uuid, seats: &[String]) -> Result<u64> {
        let mut schedules = self.schedules.lock().unwrap();
        let locks = schedules.entry(schedule_id).or_default();
        purge_expired(locks);

        let mut moved = 0;
        for seat in seats {
            if let Some((owner, _)) = locks.holds.remove(seat) {
                locks.confirmed.insert(seat.clone(), owner);
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn is_seat_available(&self, schedule_id: Uuid, seat: &str) -> Result<bool> {
        let mut schedules = self.schedules.lock().unwrap();
        let Some(locks) = schedules.get_mut(&schedule_id) else {
            return Ok(true);
        };
        purge_expired(locks);
        Ok(!locks.holds.contains_key(seat) && !locks.confirmed.contains_key(seat))
    }

    async fn held_seats(&self, schedule_id: Uuid) -> Result<HashMap<String, String>> {
        let mut schedules = self.schedules.lock().unwrap();
        let Some(locks) = schedules.get_mut(&schedule_id) else {
            return Ok(HashMap::new());
        };
        purge_expired(locks);
        Ok(locks
            .holds
            .iter()
            .map(|(seat, (owner, _))| (seat.clone(), owner.clone()))
            .collect())
    }
}

#[derive(Default)]
pub struct InMemorySessions {
    sessions: Mutex<HashMap<String, (Session, Instant)>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn put(&self, token: &str, session: &Session, ttl: Duration) -> Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(token.to_string(), (session.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<Session>> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get(token).cloned() {
            Some((_, deadline)) if deadline <= Instant::now() => {
                sessions.remove(token);
                Ok(None)
            }
            Some((session, _)) => Ok(Some(session)),
            None => Ok(None),
        }
    }

    async fn delete(&self, token: &str) -> Result<()> {
        self.sessions.lock().unwrap().remove(token);
        Ok(())
    }

    async fn rotate(
        &self,
        old_token: &str,
        new_token: &str,
        ttl: Duration,
    ) -> Result<Option<Session>> {
        let mut sessions = self.sessions.lock().unwrap();
        let Some((session, deadline)) = sessions.remove(old_token) else {
            return Ok(None);
        };
        if deadline <= Instant::now() {
            return Ok(None);
        }
        sessions.insert(
            new_token.to_string(),
            (session.clone(), Instant::now() + ttl),
        );
        Ok(Some(session))
    }
}

#[derive(Default)]
pub struct InMemorySchedules {
    schedules: Mutex<HashMap<Uuid, ScheduleSummary>>,
}

impl InMemorySchedules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, summary: ScheduleSummary) -> Uuid {
        let id = summary.id;
        self.schedules.lock().unwrap().insert(id, summary);
        id
    }

    /// Active schedule starting well in the future.
    pub fn add_upcoming(&self) -> Uuid {
        self.insert(ScheduleSummary {
            id: Uuid::new_v4(),
            is_active: true,
            starts_at: Utc::now() + ChronoDuration::hours(6),
        })
    }

    pub fn add_inactive(&self) -> Uuid {
        self.insert(ScheduleSummary {
            id: Uuid::new_v4(),
            is_active: false,
            starts_at: Utc::now() + ChronoDuration::hours(6),
        })
    }

    pub fn add_started(&self) -> Uuid {
        self.insert(ScheduleSummary {
            id: Uuid::new_v4(),
            is_active: true,
            starts_at: Utc::now() - ChronoDuration::minutes(10),
        })
    }
}

#[async_trait]
impl ScheduleGate for InMemorySchedules {
    async fn find_summary(&self, schedule_id: Uuid) -> Result<Option<ScheduleSummary>> {
        Ok(self.schedules.lock().unwrap().get(&schedule_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<HashMap<String, User>>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn insert(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.email) {
            return Err(Error::EmailTaken(user.email.clone()));
        }
        users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(email).cloned())
    }
}
