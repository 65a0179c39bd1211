use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use cinepass_domain::reservation::{HistoryRow, Reservation, ReservationStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::{admin_auth, booking_auth, CurrentUser};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let booking = Router::new()
        .route("/reservation/create", post(create_reservation))
        .route("/reservation/history", get(reservation_history))
        .route("/reservation/:id/confirm", put(confirm_reservation))
        .route("/reservation/:id/cancel", put(cancel_reservation))
        .route("/reservation/:id", get(get_reservation))
        .route_layer(from_fn_with_state(state.clone(), booking_auth));

    let admin = Router::new()
        .route("/schedule/:id/seats", get(held_seats))
        .route_layer(from_fn_with_state(state, admin_auth));

    booking.merge(admin)
}

#[derive(Debug, Deserialize)]
struct CreateReservationRequest {
    schedule_id: Uuid,
    seats: Vec<String>,
    total_price: i64,
}

#[derive(Debug, Serialize)]
struct ReservationResponse {
    id: Uuid,
    user_id: Uuid,
    schedule_id: Uuid,
    seats: Vec<String>,
    total_price: i64,
    status: ReservationStatus,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        let seats = r.seat_codes();
        ReservationResponse {
            id: r.id,
            user_id: r.user_id,
            schedule_id: r.schedule_id,
            seats,
            total_price: r.total_price,
            status: r.status,
            expires_at: r.expires_at,
            created_at: r.created_at,
        }
    }
}

async fn create_reservation(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), AppError> {
    let reservation = state
        .engine
        .create(user.user_id, req.schedule_id, req.seats, req.total_price)
        .await?;

    Ok((StatusCode::CREATED, Json(reservation.into())))
}

async fn confirm_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, AppError> {
    let reservation = state.engine.confirm(id).await?;
    Ok(Json(reservation.into()))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, AppError> {
    let reservation = state.engine.cancel(id).await?;
    Ok(Json(reservation.into()))
}

async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, AppError> {
    let reservation = state.engine.get(id).await?;
    Ok(Json(reservation.into()))
}

async fn reservation_history(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<HistoryRow>>, AppError> {
    let rows = state.engine.history(user.user_id).await?;
    Ok(Json(rows))
}

/// Current holds for a showtime, seat code -> holder. Diagnostics only.
async fn held_seats(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<HashMap<String, String>>, AppError> {
    let holds = state.seat_locks.held_seats(schedule_id).await?;
    Ok(Json(holds))
}
