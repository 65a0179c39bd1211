use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use cinepass_domain::session::{Role, Session};
use cinepass_domain::user::User;
use cinepass_domain::Error;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::{bearer_token, issue_token};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    full_name: String,
}

#[derive(Debug, Serialize)]
struct UserResponse {
    id: Uuid,
    email: String,
    full_name: String,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    if !req.email.contains('@') {
        return Err(Error::InvalidInput("invalid email address".into()).into());
    }
    if req.password.len() < 6 {
        return Err(Error::InvalidInput("password must be at least 6 characters".into()).into());
    }
    if req.full_name.trim().is_empty() {
        return Err(Error::InvalidInput("full name is required".into()).into());
    }

    let hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| Error::Internal(format!("password hashing failed: {e}")))?;

    let user = User::new(req.email, hash, req.full_name.trim(), Role::User);
    state.users.insert(&user).await?;

    info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    // One message for both failure modes, so logins don't probe for emails.
    let rejected = || Error::Unauthorized("unknown email or wrong password".into());

    let user = state
        .users
        .find_by_email(&req.email)
        .await?
        .ok_or_else(rejected)?;

    let valid = bcrypt::verify(&req.password, &user.password_hash)
        .map_err(|e| Error::Internal(format!("password verification failed: {e}")))?;
    if !valid {
        return Err(rejected().into());
    }

    let session = Session {
        user_id: user.id,
        role: user.role,
        email: user.email,
    };
    let token = issue_token(&state.auth.jwt_secret, &session, state.auth.session_ttl)?;
    state
        .sessions
        .put(&token, &session, state.auth.session_ttl)
        .await?;

    info!(user_id = %session.user_id, "user logged in");
    Ok(Json(TokenResponse { token }))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, AppError> {
    let token = bearer_token(&headers)?;
    state.sessions.delete(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Swap the current token for a fresh one: the old session entry is removed
/// in the same step, so the old token stops working immediately.
async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    let old_token = bearer_token(&headers)?;

    let session = state
        .sessions
        .get(old_token)
        .await?
        .ok_or_else(|| Error::Unauthorized("session not found or expired".into()))?;

    let new_token = issue_token(&state.auth.jwt_secret, &session, state.auth.session_ttl)?;
    state
        .sessions
        .rotate(old_token, &new_token, state.auth.session_ttl)
        .await?
        .ok_or_else(|| Error::Unauthorized("session not found or expired".into()))?;

    Ok(Json(TokenResponse { token: new_token }))
}
