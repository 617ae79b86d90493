// Startup configuration loaded once from the environment
//
// Every component receives its configuration explicitly from here; nothing
// reads the environment after startup. Missing signing or encryption secrets
// abort startup.

use anyhow::Context;
use std::env;
use std::time::Duration;

/// Identity provider settings (Google-shaped endpoints).
///
/// Endpoint URLs are configurable so tests can point the coordinator at a
/// local mock provider.
#[derive(Debug, Clone)]
pub struct OauthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

/// Background sweep intervals and the long-inactivity cutoff
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub oauth_state_interval: Duration,
    pub session_interval: Duration,
    pub inactivity_cutoff_days: i64,
}

/// Application configuration assembled at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub encryption_key: String,
    pub oauth: OauthConfig,
    pub sweeper: SweeperConfig,
    pub session_ttl_hours: i64,
    pub oauth_state_ttl_minutes: i64,
    pub cors_origins: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://taskhub.db".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);

        // Both secrets are required; a default here would silently weaken
        // every token and ciphertext the service produces.
        let jwt_secret = env::var("JWT_SECRET")
            .context("JWT_SECRET must be set (session token signing secret)")?;
        let encryption_key = env::var("ENCRYPTION_MASTER_KEY")
            .context("ENCRYPTION_MASTER_KEY must be set (base64, 32 bytes)")?;

        let oauth = OauthConfig {
            client_id: env::var("GOOGLE_CLIENT_ID").context("GOOGLE_CLIENT_ID must be set")?,
            client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .context("GOOGLE_CLIENT_SECRET must be set")?,
            redirect_url: env::var("OAUTH_REDIRECT_URL")
                .unwrap_or_else(|_| "http://localhost:8080/auth/google/callback".to_string()),
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            authorize_url: env::var("OAUTH_AUTHORIZE_URL")
                .unwrap_or_else(|_| "https://accounts.google.com/o/oauth2/v2/auth".to_string()),
            token_url: env::var("OAUTH_TOKEN_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string()),
            userinfo_url: env::var("OAUTH_USERINFO_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/oauth2/v2/userinfo".to_string()),
        };

        let sweeper = SweeperConfig {
            oauth_state_interval: Duration::from_secs(
                env_u64("OAUTH_STATE_SWEEP_INTERVAL_SECS", 300),
            ),
            session_interval: Duration::from_secs(env_u64("SESSION_SWEEP_INTERVAL_SECS", 86_400)),
            inactivity_cutoff_days: env_u64("SESSION_INACTIVITY_CUTOFF_DAYS", 7) as i64,
        };

        Ok(AppConfig {
            database_url,
            port,
            jwt_secret,
            encryption_key,
            oauth,
            sweeper,
            session_ttl_hours: env_u64("SESSION_TTL_HOURS", 24) as i64,
            oauth_state_ttl_minutes: env_u64("OAUTH_STATE_TTL_MINUTES", 5) as i64,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
