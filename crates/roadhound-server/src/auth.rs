use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use roadhound_core::registry::Token;

use crate::error::AppError;

/// Player token taken from an `Authorization: Bearer <token>` header.
///
/// Only the format is checked here; whether the token belongs to a player is
/// decided by the world.
pub struct AuthToken(pub Token);

/// Extract and validate the bearer token from request headers.
pub fn bearer_token(headers: &HeaderMap) -> Result<Token, AppError> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::InvalidToken("Authorization header is missing".into()))?;

    Token::parse(raw).ok_or_else(|| AppError::InvalidToken("Authorization header is malformed".into()))
}

impl<S: Send + Sync> FromRequestParts<S> for AuthToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(&parts.headers).map(AuthToken)
    }
}
