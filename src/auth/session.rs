//! Session manager: issues, validates, extends, refreshes, and revokes
//! application sessions.
//!
//! Session tokens are HS256 JWTs carrying the account id, session id, and
//! expiry. The algorithm is pinned on every decode; a token minted with any
//! other algorithm fails validation regardless of its signature.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::models::{Account, Claims, ClientMeta, ProviderTokens, Session, SessionContext};
use super::oauth::OauthService;
use super::store::AuthStore;
use crate::common::id_generator::generate_session_id;
use crate::services::vault::TokenVault;

/// Provider access tokens expiring within this window flag the session for
/// refresh.
const REFRESH_WINDOW_MINUTES: i64 = 5;

pub struct SessionService {
    store: AuthStore,
    vault: Arc<TokenVault>,
    oauth: Arc<OauthService>,
    jwt_secret: String,
    session_ttl_hours: i64,
}

impl SessionService {
    pub fn new(
        store: AuthStore,
        vault: Arc<TokenVault>,
        oauth: Arc<OauthService>,
        jwt_secret: String,
        session_ttl_hours: i64,
    ) -> Self {
        Self {
            store,
            vault,
            oauth,
            jwt_secret,
            session_ttl_hours,
        }
    }

    /// Create a session for an authenticated account and mint its signed
    /// token. Provider tokens, when present, are encrypted before storage
    /// and always carry their expiry.
    pub async fn issue_session(
        &self,
        account: &Account,
        provider_tokens: Option<&ProviderTokens>,
        meta: ClientMeta,
    ) -> Result<(Session, String), AuthError> {
        let now = Utc::now();
        let session_id = generate_session_id();
        let expires_at = now + Duration::hours(self.session_ttl_hours);

        let claims = Claims {
            sub: account.id.clone(),
            sid: session_id.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(AuthError::TokenMint)?;

        let (access_token_enc, refresh_token_enc, provider_token_expires_at) =
            match provider_tokens {
                Some(tokens) => {
                    let access = self.vault.encrypt(&tokens.access_token)?;
                    let refresh = tokens
                        .refresh_token
                        .as_deref()
                        .map(|t| self.vault.encrypt(t))
                        .transpose()?;
                    (Some(access), refresh, Some(tokens.expires_at))
                }
                None => (None, None, None),
            };

        let session = Session {
            id: session_id,
            account_id: account.id.clone(),
            token: token.clone(),
            access_token_enc,
            refresh_token_enc,
            provider_token_expires_at,
            expires_at,
            last_activity: now,
            user_agent: meta.user_agent,
            ip_address: meta.ip_address,
            created_at: now,
        };
        self.store.insert_session(&session).await?;

        info!(
            account_id = %account.id,
            session_id = %session.id,
            has_provider_tokens = provider_tokens.is_some(),
            "Session issued"
        );
        Ok((session, token))
    }

    /// Validate a signed session token. Returns the session context without
    /// mutating anything; callers record activity separately.
    pub async fn validate_session(&self, token: &str) -> Result<SessionContext, AuthError> {
        // Algorithm-confusion defense: inspect the header before verifying,
        // and verify with the expected algorithm only.
        let header = decode_header(token).map_err(|_| AuthError::InvalidToken)?;
        if header.alg != Algorithm::HS256 {
            warn!(alg = ?header.alg, "Session token with unexpected algorithm rejected");
            return Err(AuthError::InvalidToken);
        }

        // Expiry lives in the session row, not the claim: `extend_session`
        // moves `expires_at` past the token's original `exp`, and the token
        // must stay valid for as long as the row says it is.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::InvalidToken)?;

        let claims = decoded.claims;
        let session = self
            .store
            .find_session(&claims.sid)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        // A verified signature over a terminated-and-reissued session id
        // must not resurrect the old credential.
        if session.token != token || session.account_id != claims.sub {
            return Err(AuthError::InvalidToken);
        }

        let now = Utc::now();
        if now >= session.expires_at {
            return Err(AuthError::Expired);
        }

        let needs_provider_refresh = session.access_token_enc.is_some()
            && session
                .provider_token_expires_at
                .map(|at| at <= now + Duration::minutes(REFRESH_WINDOW_MINUTES))
                .unwrap_or(false);

        Ok(SessionContext {
            account_id: session.account_id,
            session_id: session.id,
            needs_provider_refresh,
        })
    }

    /// Bump `last_activity`. Never extends the session expiry; never moves
    /// the stored activity timestamp backward.
    pub async fn record_activity(&self, session_id: &str) -> Result<(), AuthError> {
        self.store.touch_activity(session_id, Utc::now()).await?;
        Ok(())
    }

    /// Push the session expiry out to now + TTL. Expired or terminated
    /// sessions are not revived.
    pub async fn extend_session(&self, session_id: &str) -> Result<Session, AuthError> {
        let now = Utc::now();
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(AuthError::AlreadyExpired)?;

        if now >= session.expires_at {
            return Err(AuthError::AlreadyExpired);
        }

        let new_expiry = now + Duration::hours(self.session_ttl_hours);
        self.store
            .extend_session(session_id, new_expiry, now)
            .await?;

        // Re-read rather than assume: a concurrent extension may have won
        // with a slightly later expiry.
        self.store
            .find_session(session_id)
            .await?
            .ok_or(AuthError::AlreadyExpired)
    }

    /// Refresh the stored provider tokens through the oauth coordinator.
    /// A provider-side revocation terminates the session before the error
    /// is returned, so a half-revoked session is never observable.
    pub async fn refresh_provider_tokens(&self, session_id: &str) -> Result<Session, AuthError> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let refresh_token_enc = match session.refresh_token_enc.as_deref() {
            Some(enc) if !enc.is_empty() => enc,
            _ => return Err(AuthError::NotRefreshable),
        };
        let refresh_token = self.vault.decrypt(refresh_token_enc)?;

        let new_tokens = match self.oauth.refresh_tokens(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(AuthError::Revoked) => {
                warn!(
                    session_id = %session.id,
                    account_id = %session.account_id,
                    "Provider revoked tokens, terminating session"
                );
                self.terminate_session(&session.id).await?;
                return Err(AuthError::Revoked);
            }
            Err(e) => return Err(e),
        };

        self.store_refreshed_tokens(&session.id, &new_tokens).await?;

        debug!(session_id = %session.id, "Provider tokens refreshed");
        self.store
            .find_session(&session.id)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    async fn store_refreshed_tokens(
        &self,
        session_id: &str,
        tokens: &ProviderTokens,
    ) -> Result<(), AuthError> {
        let access_enc = self.vault.encrypt(&tokens.access_token)?;
        let refresh_enc = tokens
            .refresh_token
            .as_deref()
            .map(|t| self.vault.encrypt(t))
            .transpose()?;

        self.store
            .update_provider_tokens(
                session_id,
                &access_enc,
                refresh_enc.as_deref(),
                tokens.expires_at,
            )
            .await?;
        Ok(())
    }

    /// Delete the session record. Idempotent.
    pub async fn terminate_session(&self, session_id: &str) -> Result<(), AuthError> {
        self.store.delete_session(session_id).await?;
        info!(session_id = %session_id, "Session terminated");
        Ok(())
    }

    /// Decrypted provider access token for outbound provider calls, if one
    /// is stored with the session.
    #[allow(dead_code)]
    pub async fn provider_access_token(
        &self,
        session_id: &str,
    ) -> Result<Option<(String, DateTime<Utc>)>, AuthError> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        match (session.access_token_enc, session.provider_token_expires_at) {
            (Some(enc), Some(expires_at)) => {
                Ok(Some((self.vault.decrypt(&enc)?, expires_at)))
            }
            _ => Ok(None),
        }
    }
}
