//! OAuth flow coordinator
//!
//! Turns a provider login into a normalized identity: generates and validates
//! the anti-CSRF state, builds the authorization URL, exchanges the code
//! (with PKCE) for provider tokens, and fetches the identity endpoint.
//!
//! Order matters in `complete_login`: the CSRF check and atomic state
//! consume happen before any network call, so attack traffic is rejected
//! cheaply and a state token is never usable twice.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use rand::RngCore;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::models::{NormalizedIdentity, OauthStateRecord, ProviderTokens, TokenResponse, UserInfoResponse};
use super::store::AuthStore;
use crate::common::config::OauthConfig;
use crate::common::helpers::{normalize_email, safe_email_log};

/// Provider name recorded on identities minted by this coordinator
pub const PROVIDER_NAME: &str = "google";

/// Outcome of a completed login: the normalized identity plus the post-login
/// redirect target stored when the attempt was initiated.
#[derive(Debug)]
pub struct CompletedLogin {
    pub identity: NormalizedIdentity,
    pub redirect_target: String,
}

/// PKCE verifier/challenge pair (S256)
struct PkcePair {
    verifier: String,
    challenge: String,
}

fn generate_pkce_pair() -> PkcePair {
    let verifier = random_url_safe_token();

    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

    PkcePair {
        verifier,
        challenge,
    }
}

/// 32 random bytes, URL-safe base64. Used for both state tokens and PKCE
/// verifiers.
fn random_url_safe_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn build_authorize_url(config: &OauthConfig, state: &str, challenge: &str) -> String {
    let scope_param = config.scopes.join(" ");

    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&code_challenge={}&code_challenge_method=S256&access_type=offline&prompt=consent",
        config.authorize_url,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_url),
        urlencoding::encode(&scope_param),
        urlencoding::encode(state),
        urlencoding::encode(challenge),
    )
}

pub struct OauthService {
    config: OauthConfig,
    store: AuthStore,
    client: Client,
    state_ttl_minutes: i64,
}

impl OauthService {
    pub fn new(
        config: OauthConfig,
        store: AuthStore,
        client: Client,
        state_ttl_minutes: i64,
    ) -> Self {
        Self {
            config,
            store,
            client,
            state_ttl_minutes,
        }
    }

    /// Start a login attempt: persist a single-use state record and return
    /// the provider authorization URL together with the state token the
    /// caller round-trips through a cookie.
    pub async fn initiate_login(
        &self,
        redirect_target: &str,
    ) -> Result<(String, String), AuthError> {
        let state = random_url_safe_token();
        let pkce = generate_pkce_pair();
        let now = Utc::now();

        let record = OauthStateRecord {
            state: state.clone(),
            pkce_verifier: pkce.verifier,
            redirect_target: redirect_target.to_string(),
            created_at: now,
            expires_at: now + Duration::minutes(self.state_ttl_minutes),
        };
        self.store.insert_oauth_state(&record).await?;

        let url = build_authorize_url(&self.config, &state, &pkce.challenge);

        debug!("Initiated oauth login, state record persisted");
        Ok((url, state))
    }

    /// Complete a login attempt: CSRF validation, single-use state consume,
    /// code exchange, identity fetch, verified-email gate.
    pub async fn complete_login(
        &self,
        code: &str,
        state: &str,
        cookie_state: &str,
    ) -> Result<CompletedLogin, AuthError> {
        // CSRF defense, before any database or network work
        if state.is_empty() || state != cookie_state {
            warn!("Oauth callback state does not match cookie");
            return Err(AuthError::StateMismatch);
        }

        // Atomic consume: a replayed state finds no row here
        let record = self
            .store
            .consume_oauth_state(state)
            .await?
            .ok_or(AuthError::StateMismatch)?;

        if Utc::now() >= record.expires_at {
            warn!("Oauth callback state has expired");
            return Err(AuthError::StateMismatch);
        }

        let tokens = self.exchange_code(code, &record.pkce_verifier).await?;
        let identity = self.fetch_identity(tokens).await?;

        info!(
            email = %safe_email_log(&identity.email),
            provider = PROVIDER_NAME,
            "Oauth login completed"
        );
        Ok(CompletedLogin {
            identity,
            redirect_target: record.redirect_target,
        })
    }

    /// Exchange an authorization code (plus the stored PKCE verifier) for
    /// provider tokens.
    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ProviderTokens, AuthError> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
            ("code_verifier", pkce_verifier),
        ];

        debug!("Exchanging authorization code for tokens");

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::ProviderError(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(http_status = %status, "Code exchange failed");
            return Err(AuthError::ProviderError(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let token_response = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::ProviderError(format!("malformed token response: {}", e)))?;

        Ok(ProviderTokens {
            expires_at: Utc::now() + Duration::seconds(token_response.expires_in),
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
        })
    }

    /// Fetch the provider's identity endpoint and reduce the payload to a
    /// normalized identity. Unverified emails are rejected here, before any
    /// account resolution can happen.
    async fn fetch_identity(&self, tokens: ProviderTokens) -> Result<NormalizedIdentity, AuthError> {
        let response = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| {
                AuthError::ProviderError(format!("userinfo endpoint unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(http_status = %status, "Userinfo fetch failed");
            return Err(AuthError::ProviderError(format!(
                "userinfo endpoint returned {}",
                status
            )));
        }

        let info = response
            .json::<UserInfoResponse>()
            .await
            .map_err(|e| AuthError::ProviderError(format!("malformed userinfo response: {}", e)))?;

        if !info.verified_email {
            warn!(
                email = %safe_email_log(&info.email),
                "Provider reports email as unverified, refusing to link"
            );
            return Err(AuthError::IdentityUnverified);
        }

        Ok(NormalizedIdentity {
            provider: PROVIDER_NAME.to_string(),
            subject_id: info.id,
            email: normalize_email(&info.email),
            email_verified: info.verified_email,
            display_name: info.name,
            tokens,
        })
    }

    /// Refresh grant against the token endpoint. A 4xx rejection means the
    /// provider revoked the grant; network and 5xx failures stay retryable.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<ProviderTokens, AuthError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        debug!("Refreshing provider tokens");

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::ProviderError(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if status.is_client_error() {
            warn!(http_status = %status, "Refresh grant rejected by provider");
            return Err(AuthError::Revoked);
        }
        if !status.is_success() {
            warn!(http_status = %status, "Refresh grant failed");
            return Err(AuthError::ProviderError(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let token_response = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::ProviderError(format!("malformed token response: {}", e)))?;

        Ok(ProviderTokens {
            expires_at: Utc::now() + Duration::seconds(token_response.expires_in),
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
        })
    }
}
