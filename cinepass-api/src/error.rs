use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cinepass_domain::Error;
use serde_json::json;

/// Newtype bridging the domain taxonomy into axum responses. Every error
/// renders as `{ "error": <kind>, "message": <text> }` with a stable status.
#[derive(Debug)]
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_)
            | Error::ScheduleInactive(_)
            | Error::ScheduleAlreadyStarted(_)
            | Error::InvalidStateTransition { .. }
            | Error::Expired(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::SeatUnavailable(_) | Error::EmailTaken(_) => StatusCode::CONFLICT,
            Error::Database(_)
            | Error::TransientIo(_)
            | Error::Inconsistency(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal server error");
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = Json(json!({
            "error": self.0.kind(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
