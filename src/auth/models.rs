//! Authentication data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A local user account.
///
/// Invariant: at least one credential (password hash or linked provider
/// identity); email is stored normalized (trimmed, lowercased) and unique.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Link between one account and one external identity.
/// (provider, subject_id) is globally unique; read-only after linking.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct ProviderIdentity {
    pub account_id: String,
    pub provider: String,
    pub subject_id: String,
    pub email: String,
    pub email_verified: bool,
    pub linked_at: DateTime<Utc>,
}

/// Short-lived CSRF/PKCE record for one in-flight login attempt.
/// Single use: consumed atomically with validation.
#[derive(FromRow, Debug, Clone)]
pub struct OauthStateRecord {
    pub state: String,
    pub pkce_verifier: String,
    pub redirect_target: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// An authenticated client's durable credential.
///
/// Invariants: `expires_at` never exceeds 24h from the most recent extension;
/// an encrypted access token is always accompanied by its expiry.
#[derive(FromRow, Debug, Clone)]
pub struct Session {
    pub id: String,
    pub account_id: String,
    pub token: String,
    pub access_token_enc: Option<String>,
    pub refresh_token_enc: Option<String>,
    pub provider_token_expires_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Provider identity claims reduced to a stable shape, independent of the
/// provider's payload format. Email arrives normalized.
#[derive(Debug, Clone)]
pub struct NormalizedIdentity {
    pub provider: String,
    pub subject_id: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub tokens: ProviderTokens,
}

/// Raw provider tokens with their expiry, held only in memory until the
/// session manager encrypts them for storage.
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Signed session token claims
#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    /// Account id
    pub sub: String,
    /// Session id
    pub sid: String,
    /// Issued-at (unix seconds)
    pub iat: i64,
    /// Expires-at (unix seconds)
    pub exp: i64,
}

/// Result of validating a session token, handed to downstream collaborators.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub account_id: String,
    pub session_id: String,
    /// True when a provider access token is stored and expires within
    /// five minutes.
    pub needs_provider_refresh: bool,
}

/// Client metadata captured when a session is issued
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Token endpoint response (authorization-code and refresh grants)
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: String,
    pub scope: Option<String>,
}

/// Userinfo endpoint response
#[derive(Debug, Deserialize)]
pub struct UserInfoResponse {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub verified_email: bool,
    pub name: Option<String>,
}
