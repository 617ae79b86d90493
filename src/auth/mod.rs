//! # Auth Module
//!
//! Authentication and session management core:
//! - Oauth login flow (anti-CSRF state, PKCE, code exchange, identity fetch)
//! - Identity linking and account resolution
//! - Session issuance, validation, extension, refresh, and revocation
//! - AuthedSession extractor for protected routes

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod linker;
pub mod models;
pub mod oauth;
pub mod routes;
pub mod session;
pub mod store;

#[cfg(test)]
mod tests;

pub use extractors::AuthedSession;
pub use models::{Account, NormalizedIdentity, Session, SessionContext};
pub use routes::auth_routes;
