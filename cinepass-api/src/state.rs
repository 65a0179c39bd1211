use std::sync::Arc;
use std::time::Duration;

use cinepass_domain::store::{SeatLockStore, SessionStore, UserRepository};

use crate::engine::ReservationEngine;

#[derive(Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub session_ttl: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReservationEngine>,
    pub seat_locks: Arc<dyn SeatLockStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserRepository>,
    pub auth: AuthSettings,
}
