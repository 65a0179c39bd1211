use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use cinepass_domain::session::{Role, Session};
use cinepass_domain::{Error, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub jti: Uuid,
    pub exp: usize,
}

/// Identity attached to the request once the gate has let it through.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub role: Role,
    pub email: String,
}

pub fn issue_token(secret: &str, session: &Session, ttl: std::time::Duration) -> Result<String> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| Error::Internal(format!("session ttl out of range: {e}")))?;
    let claims = Claims {
        sub: session.user_id.to_string(),
        email: session.email.clone(),
        role: session.role.as_str().to_string(),
        jti: Uuid::new_v4(),
        exp: (Utc::now() + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("token signing failed: {e}")))
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| Error::Unauthorized("authorization header is required".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("invalid authorization header format".into()))?;

    if token.is_empty() {
        return Err(Error::Unauthorized("token is required".into()));
    }
    Ok(token)
}

/// Full gate: bearer token, JWT signature/expiry, session lookup, and a
/// cross-check of claims against the stored session. The session store is
/// the ground truth; the token alone never authenticates a request.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser> {
    let token = bearer_token(headers)?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| Error::Unauthorized("token validation failed".into()))?;

    let session = state
        .sessions
        .get(token)
        .await?
        .ok_or_else(|| Error::Unauthorized("session not found or expired".into()))?;

    let claims = data.claims;
    if claims.sub != session.user_id.to_string()
        || claims.email != session.email
        || Role::parse(&claims.role) != Some(session.role)
    {
        return Err(Error::Unauthorized("token and session mismatch".into()));
    }

    Ok(CurrentUser {
        user_id: session.user_id,
        role: session.role,
        email: session.email,
    })
}

pub async fn booking_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> std::result::Result<Response, AppError> {
    let user = authenticate(&state, req.headers()).await?;
    if !user.role.can_book() {
        return Err(Error::Forbidden("insufficient permissions".into()).into());
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

pub async fn admin_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> std::result::Result<Response, AppError> {
    let user = authenticate(&state, req.headers()).await?;
    if user.role != Role::Admin {
        return Err(Error::Forbidden("insufficient permissions".into()).into());
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction_rejects_malformed_headers() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(Error::Unauthorized(_))
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert!(matches!(
            bearer_token(&headers),
            Err(Error::Unauthorized(_))
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(matches!(
            bearer_token(&headers),
            Err(Error::Unauthorized(_))
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc");
    }

    #[test]
    fn issued_tokens_decode_with_the_same_secret() {
        let session = Session {
            user_id: Uuid::new_v4(),
            role: Role::User,
            email: "moviegoer@example.com".into(),
        };
        let token =
            issue_token("secret", &session, std::time::Duration::from_secs(3600)).unwrap();

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(decoded.claims.sub, session.user_id.to_string());
        assert_eq!(decoded.claims.role, "user");

        assert!(decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::default(),
        )
        .is_err());
    }
}
