//! Tagged error kinds for the authentication core
//!
//! Callers classify failures by matching on the variant, never by inspecting
//! message text. Messages carry no provider tokens, keys, or state tokens.

use thiserror::Error;

use crate::services::vault::VaultError;

/// Authentication and session error kinds
#[derive(Debug, Error)]
pub enum AuthError {
    /// CSRF defense tripped: callback state does not match the cookie, the
    /// stored record is missing, already consumed, or expired. Always fatal
    /// to the login attempt.
    #[error("oauth state mismatch or expired")]
    StateMismatch,

    /// The user declined the authorization request at the provider.
    #[error("authorization was declined at the provider")]
    ProviderDenied,

    /// Network failure, non-2xx response, or malformed payload from the
    /// provider. Retryable by the user; never retried internally.
    #[error("provider request failed: {0}")]
    ProviderError(String),

    /// The provider reports the email as unverified. Unverified identities
    /// are never linked or trusted for account resolution.
    #[error("provider email address is not verified")]
    IdentityUnverified,

    /// Ambiguous merge: the provider identity and the email lookup point at
    /// different accounts, or the resolved account is deactivated. Never
    /// auto-resolved.
    #[error("provider identity conflicts with an existing account")]
    IdentityConflict,

    /// Session token signature or structure is invalid.
    #[error("invalid session token")]
    InvalidToken,

    /// Session has passed its expiry.
    #[error("session expired")]
    Expired,

    /// The provider reported the stored tokens as revoked. The owning
    /// session is terminated before this is returned.
    #[error("provider tokens revoked")]
    Revoked,

    /// The session has no stored refresh token.
    #[error("session has no provider tokens to refresh")]
    NotRefreshable,

    /// Extension was requested for a session that is already expired.
    #[error("session already expired")]
    AlreadyExpired,

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("credential vault error")]
    Vault(#[from] VaultError),

    /// Session token could not be minted. Distinct from `InvalidToken`,
    /// which covers validation of inbound tokens.
    #[error("session token encoding failed")]
    TokenMint(#[source] jsonwebtoken::errors::Error),
}
