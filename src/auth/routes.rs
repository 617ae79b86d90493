//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /auth/google` - Start the oauth login flow
/// - `GET /auth/google/callback` - Provider redirect target
/// - `GET /api/me` - Current account information
/// - `POST /api/session/extend` - Extend the session expiry
/// - `POST /api/session/refresh` - Refresh stored provider tokens
/// - `POST /api/auth/logout` - Terminate the session
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/google", get(handlers::oauth_start))
        .route("/auth/google/callback", get(handlers::oauth_callback))
        .route("/api/me", get(handlers::me_handler))
        .route("/api/session/extend", post(handlers::extend_session_handler))
        .route("/api/session/refresh", post(handlers::refresh_session_handler))
        .route("/api/auth/logout", post(handlers::logout_handler))
}
