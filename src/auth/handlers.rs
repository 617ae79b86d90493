//! Authentication handlers
//!
//! Thin HTTP adapter over the auth operations: maps query parameters and
//! cookies onto the coordinator/linker/session services and their results
//! onto redirects, cookies, and JSON. No auth logic lives here.

use axum::{
    extract::{Extension, Query},
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use std::collections::HashMap;
use tracing::{info, warn};

use super::extractors::{AuthedSession, SESSION_COOKIE, STATE_COOKIE};
use super::models::{Account, ClientMeta};
use crate::common::{ApiError, AppState};

const STATE_COOKIE_MAX_AGE_SECS: i64 = 300;

fn set_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, value, max_age_secs
    )
}

fn clear_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}

fn client_meta(headers: &HeaderMap) -> ClientMeta {
    ClientMeta {
        user_agent: headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip_address: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string()),
    }
}

fn cookie_from_headers(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// GET /auth/google - Start the oauth flow
///
/// Persists a single-use state record, sets the state cookie, and redirects
/// to the provider's authorization page.
pub async fn oauth_start(
    Extension(state): Extension<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let redirect_target = params
        .get("redirect")
        .cloned()
        .unwrap_or_else(|| "/".to_string());

    let (auth_url, state_token) = state
        .oauth_service
        .initiate_login(&redirect_target)
        .await?;

    info!("Starting oauth login");
    Ok((
        AppendHeaders([(
            SET_COOKIE,
            set_cookie(STATE_COOKIE, &state_token, STATE_COOKIE_MAX_AGE_SECS),
        )]),
        Redirect::to(&auth_url),
    ))
}

/// GET /auth/google/callback - Handle the provider redirect
///
/// Provider denial and missing parameters are reported immediately, before
/// any network call. The state cookie is single-use and cleared on every
/// outcome; success additionally sets the session cookie and redirects the
/// client to its original target.
pub async fn oauth_callback(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let clear_state = AppendHeaders([(SET_COOKIE, clear_cookie(STATE_COOKIE))]);

    match run_callback(&state, &headers, &params).await {
        Ok((token, redirect_target)) => {
            let session_max_age = state.config.session_ttl_hours * 3600;
            (
                clear_state,
                AppendHeaders([(
                    SET_COOKIE,
                    set_cookie(SESSION_COOKIE, &token, session_max_age),
                )]),
                Redirect::to(&redirect_target),
            )
                .into_response()
        }
        Err(err) => (clear_state, err).into_response(),
    }
}

async fn run_callback(
    state: &AppState,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
) -> Result<(String, String), ApiError> {
    if let Some(error) = params.get("error") {
        warn!(oauth_error = %error, "Provider denied the authorization request");
        return Err(super::error::AuthError::ProviderDenied.into());
    }

    let code = params
        .get("code")
        .ok_or_else(|| ApiError::BadRequest("missing code parameter".to_string()))?;
    let callback_state = params
        .get("state")
        .ok_or_else(|| ApiError::BadRequest("missing state parameter".to_string()))?;
    let cookie_state = cookie_from_headers(headers, STATE_COOKIE)
        .ok_or_else(|| ApiError::BadRequest("missing state cookie".to_string()))?;

    let completed = state
        .oauth_service
        .complete_login(code, callback_state, &cookie_state)
        .await?;

    let (account, is_new_account) = state
        .identity_linker
        .resolve_account(&completed.identity)
        .await?;

    let (session, token) = state
        .session_service
        .issue_session(
            &account,
            Some(&completed.identity.tokens),
            client_meta(headers),
        )
        .await?;

    info!(
        account_id = %account.id,
        session_id = %session.id,
        is_new_account,
        "Login completed, session issued"
    );

    Ok((token, completed.redirect_target))
}

/// GET /api/me - Current account for a validated session
pub async fn me_handler(
    Extension(state): Extension<AppState>,
    authed: AuthedSession,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
        .bind(&authed.account_id)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    Ok(Json(serde_json::json!({
        "account": account,
        "needs_provider_refresh": authed.needs_provider_refresh,
    })))
}

/// POST /api/session/extend - Push the session expiry out by the TTL
pub async fn extend_session_handler(
    Extension(state): Extension<AppState>,
    authed: AuthedSession,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state
        .session_service
        .extend_session(&authed.session_id)
        .await?;

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "expires_at": session.expires_at,
    })))
}

/// POST /api/session/refresh - Refresh the stored provider tokens
pub async fn refresh_session_handler(
    Extension(state): Extension<AppState>,
    authed: AuthedSession,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state
        .session_service
        .refresh_provider_tokens(&authed.session_id)
        .await?;

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "provider_token_expires_at": session.provider_token_expires_at,
    })))
}

/// POST /api/auth/logout - Terminate the session and clear cookies
pub async fn logout_handler(
    Extension(state): Extension<AppState>,
    authed: AuthedSession,
) -> Result<impl IntoResponse, ApiError> {
    state
        .session_service
        .terminate_session(&authed.session_id)
        .await?;

    info!(session_id = %authed.session_id, "User logged out");
    Ok((
        AppendHeaders([
            (SET_COOKIE, clear_cookie(SESSION_COOKIE)),
            (SET_COOKIE, clear_cookie(STATE_COOKIE)),
        ]),
        Json(serde_json::json!({ "message": "Logout successful" })),
    ))
}
