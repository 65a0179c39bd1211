use thiserror::Error;
use uuid::Uuid;

use crate::reservation::ReservationStatus;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("schedule {0} is inactive")]
    ScheduleInactive(Uuid),
    #[error("schedule {0} has already started")]
    ScheduleAlreadyStarted(Uuid),
    #[error("seat {0} is not available")]
    SeatUnavailable(String),
    #[error("cannot transition reservation from {from} to {to}")]
    InvalidStateTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    #[error("reservation {0} has expired")]
    Expired(Uuid),
    #[error("email {0} is already registered")]
    EmailTaken(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("store unavailable: {0}")]
    TransientIo(String),
    #[error("store inconsistency: {0}")]
    Inconsistency(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn database(err: impl std::fmt::Display) -> Self {
        Error::Database(err.to_string())
    }

    pub fn transient(err: impl std::fmt::Display) -> Self {
        Error::TransientIo(err.to_string())
    }

    /// Stable machine-readable kind, used as the `error` field of HTTP
    /// error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::ScheduleInactive(_) => "schedule_inactive",
            Error::ScheduleAlreadyStarted(_) => "schedule_already_started",
            Error::SeatUnavailable(_) => "seats_unavailable",
            Error::InvalidStateTransition { .. } => "invalid_status_transition",
            Error::Expired(_) => "reservation_expired",
            Error::EmailTaken(_) => "email_taken",
            Error::Database(_) => "database_error",
            Error::TransientIo(_) => "transient_io",
            Error::Inconsistency(_) => "store_inconsistency",
            Error::Internal(_) => "internal_error",
        }
    }
}
