//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, header::COOKIE, request::Parts},
};
use tracing::warn;

use crate::common::{ApiError, AppState};

/// Cookie carrying the signed session token
pub const SESSION_COOKIE: &str = "session_token";
/// Cookie round-tripping the oauth state through the provider redirect
pub const STATE_COOKIE: &str = "oauth_state";

/// Pull a named cookie value out of the Cookie header
pub fn cookie_value(parts: &Parts, name: &str) -> Option<String> {
    let header = parts.headers.get(COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Validated session extractor for protected routes.
///
/// Accepts the session cookie or a Bearer token, validates the signed token
/// against the session store, and records activity on the session.
#[derive(Debug)]
pub struct AuthedSession {
    pub account_id: String,
    pub session_id: String,
    pub needs_provider_refresh: bool,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app_state): Extension<AppState> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).to_string());

        let token = match bearer.or_else(|| cookie_value(parts, SESSION_COOKIE)) {
            Some(t) => t,
            None => {
                warn!("Authentication failed: no session token presented");
                return Err(ApiError::Unauthorized("missing session".into()));
            }
        };

        let context = app_state.session_service.validate_session(&token).await?;

        // Activity is recorded on every authenticated request; expiry
        // extension stays an explicit, separate operation.
        app_state
            .session_service
            .record_activity(&context.session_id)
            .await?;

        Ok(AuthedSession {
            account_id: context.account_id,
            session_id: context.session_id,
            needs_provider_refresh: context.needs_provider_refresh,
        })
    }
}
