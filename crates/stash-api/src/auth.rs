//! Request authentication.
//!
//! stash runs behind an authenticating proxy that forwards the user's id in
//! a trusted header (`AUTH_HEADER`, default `x-user-id`). Every handler that
//! touches owned data takes [`RequireAuth`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use stash_core::uuid_utils::parse_client_id;

use crate::{ApiError, AppState};

/// Extractor for authenticated requests, yielding the owner id.
///
/// ```ignore
/// async fn my_handler(auth: RequireAuth) -> impl IntoResponse {
///     let owner = auth.owner;
///     // ... owner-scoped work
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireAuth {
    pub owner: Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(state.config.auth_header.as_str())
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

        let owner = parse_client_id(raw)
            .ok_or_else(|| ApiError::Unauthorized("Invalid user id".to_string()))?;

        Ok(RequireAuth { owner })
    }
}
