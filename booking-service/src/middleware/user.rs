//! Caller identity for user-scoped endpoints.
//!
//! The upstream proxy authenticates the user and forwards the id in
//! `X-User-ID`. Row ownership is enforced by filtering on it in the store.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-ID";

#[derive(Debug, Clone, Copy)]
pub struct UserContext {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing X-User-ID header")))?;

        let user_id = Uuid::parse_str(raw.trim())
            .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid X-User-ID header")))?;

        Ok(UserContext { user_id })
    }
}
