// HTTP middleware

use axum::{
    extract::{FromRef, FromRequestParts, Query},
    http::request::Parts,
};
use saerinmeet_core::models::UserId;
use serde::Deserialize;

use super::{AppError, AppState};

/// Authenticated user extracted from JWT token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Bearer token from the Authorization header, or `?token=` for links
/// opened directly by the browser (downloads)
fn extract_token(parts: &Parts) -> Result<String, AppError> {
    if let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) {
        let value = header
            .to_str()
            .map_err(|e| AppError::unauthorized(format!("Invalid Authorization header: {e}")))?;
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(query)| query.token)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("No authentication token, access denied"))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = extract_token(parts)?;

        let claims = app_state
            .jwt_service
            .verify_token(&token)
            .map_err(|e| AppError::unauthorized(format!("{e}")))?;

        let user_id = claims
            .user_id()
            .ok_or_else(|| AppError::unauthorized("Token has no user id"))?;

        Ok(Self { user_id })
    }
}
