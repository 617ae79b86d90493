//! Tests for the auth module
//!
//! These cover the invariants the subsystem exists for: single-use state
//! tokens, idempotent identity linking, session expiry monotonicity, sweep
//! correctness, and vault round-trips. The provider is mocked by a throwaway
//! axum server bound to an ephemeral port.

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

use super::error::AuthError;
use super::linker::IdentityLinker;
use super::models::{Claims, ClientMeta, NormalizedIdentity, OauthStateRecord, ProviderTokens, Session};
use super::oauth::OauthService;
use super::session::SessionService;
use super::store::AuthStore;
use crate::common::config::{AppConfig, OauthConfig, SweeperConfig};
use crate::common::helpers::normalize_email;
use crate::common::migrations::run_migrations;
use crate::common::state::AppState;
use crate::services::vault::TokenVault;

// ---- harness ----

struct Harness {
    pool: SqlitePool,
    store: AuthStore,
    oauth: Arc<OauthService>,
    linker: Arc<IdentityLinker>,
    sessions: Arc<SessionService>,
}

async fn setup_pool() -> SqlitePool {
    // Single connection: an in-memory database is per-connection.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

fn oauth_config(base_url: &str) -> OauthConfig {
    OauthConfig {
        client_id: "test_client_id".to_string(),
        client_secret: "test_secret".to_string(),
        redirect_url: "http://localhost:8080/auth/google/callback".to_string(),
        scopes: vec![
            "openid".to_string(),
            "email".to_string(),
            "profile".to_string(),
        ],
        authorize_url: format!("{}/authorize", base_url),
        token_url: format!("{}/token", base_url),
        userinfo_url: format!("{}/userinfo", base_url),
    }
}

fn test_app_config(base_url: &str) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        port: 0,
        jwt_secret: "test-signing-secret".to_string(),
        encryption_key: TokenVault::generate_key(),
        oauth: oauth_config(base_url),
        sweeper: SweeperConfig {
            oauth_state_interval: std::time::Duration::from_secs(300),
            session_interval: std::time::Duration::from_secs(86_400),
            inactivity_cutoff_days: 7,
        },
        session_ttl_hours: 24,
        oauth_state_ttl_minutes: 5,
        cors_origins: "http://localhost:3000".to_string(),
    }
}

async fn spawn_provider(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Provider that exchanges any code and reports the given identity
fn provider_router(subject: &str, email: &str, verified: bool) -> Router {
    let subject = subject.to_string();
    let email = email.to_string();

    Router::new()
        .route(
            "/token",
            post(|| async {
                Json(json!({
                    "access_token": "provider-access-token",
                    "refresh_token": "provider-refresh-token",
                    "expires_in": 3600,
                    "token_type": "Bearer",
                }))
            }),
        )
        .route(
            "/userinfo",
            get(move || async move {
                Json(json!({
                    "id": subject,
                    "email": email,
                    "verified_email": verified,
                    "name": "Test User",
                }))
            }),
        )
}

/// Provider whose token endpoint rejects every grant
fn revoking_provider_router() -> Router {
    Router::new().route(
        "/token",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_grant" })),
            )
        }),
    )
}

async fn harness_with_base(base_url: &str) -> Harness {
    let pool = setup_pool().await;
    let store = AuthStore::new(pool.clone());

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap();

    let oauth = Arc::new(OauthService::new(
        oauth_config(base_url),
        store.clone(),
        client,
        5,
    ));
    let vault = Arc::new(TokenVault::from_key(&TokenVault::generate_key()).unwrap());
    let linker = Arc::new(IdentityLinker::new(store.clone()));
    let sessions = Arc::new(SessionService::new(
        store.clone(),
        vault,
        oauth.clone(),
        "test-signing-secret".to_string(),
        24,
    ));

    Harness {
        pool,
        store,
        oauth,
        linker,
        sessions,
    }
}

async fn harness() -> Harness {
    // No provider behind this base: tests using it never reach the network
    harness_with_base("http://127.0.0.1:9").await
}

fn google_identity(subject: &str, email: &str, verified: bool) -> NormalizedIdentity {
    NormalizedIdentity {
        provider: "google".to_string(),
        subject_id: subject.to_string(),
        email: normalize_email(email),
        email_verified: verified,
        display_name: Some("Test User".to_string()),
        tokens: ProviderTokens {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            expires_at: Utc::now() + Duration::hours(1),
        },
    }
}

async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---- oauth flow ----

#[tokio::test]
async fn test_full_login_scenario() {
    let base = spawn_provider(provider_router("g-1", "u@test.com", true)).await;
    let h = harness_with_base(&base).await;

    let (auth_url, state) = h.oauth.initiate_login("/dashboard").await.unwrap();
    assert!(auth_url.contains(&format!("state={}", state)));
    assert_eq!(count(&h.pool, "oauth_states").await, 1);

    let completed = h.oauth.complete_login("code1", &state, &state).await.unwrap();
    assert_eq!(completed.redirect_target, "/dashboard");
    assert_eq!(completed.identity.subject_id, "g-1");
    assert_eq!(completed.identity.email, "u@test.com");

    let (account, is_new) = h.linker.resolve_account(&completed.identity).await.unwrap();
    assert!(is_new);
    assert_eq!(account.email, "u@test.com");

    let identity = h.store.find_identity("google", "g-1").await.unwrap().unwrap();
    assert_eq!(identity.account_id, account.id);

    let before = Utc::now();
    let (session, token) = h
        .sessions
        .issue_session(&account, Some(&completed.identity.tokens), ClientMeta::default())
        .await
        .unwrap();

    let expected = before + Duration::hours(24);
    assert!((session.expires_at - expected).num_seconds().abs() < 5);

    let context = h.sessions.validate_session(&token).await.unwrap();
    assert_eq!(context.account_id, account.id);
    assert_eq!(context.session_id, session.id);
}

#[tokio::test]
async fn test_state_single_use() {
    let base = spawn_provider(provider_router("g-1", "u@test.com", true)).await;
    let h = harness_with_base(&base).await;

    let (_, state) = h.oauth.initiate_login("/").await.unwrap();

    assert!(h.oauth.complete_login("code1", &state, &state).await.is_ok());

    // Replay: the state row is gone, the second call must fail
    let err = h
        .oauth
        .complete_login("code1", &state, &state)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StateMismatch));
}

#[tokio::test]
async fn test_state_cookie_mismatch_checked_before_consume() {
    let h = harness().await;
    let (_, state) = h.oauth.initiate_login("/").await.unwrap();

    let err = h
        .oauth
        .complete_login("code1", &state, "different-cookie-value")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StateMismatch));

    // The mismatch did not consume the record
    assert_eq!(count(&h.pool, "oauth_states").await, 1);
}

#[tokio::test]
async fn test_expired_state_rejected() {
    let h = harness().await;

    let now = Utc::now();
    let record = OauthStateRecord {
        state: "stale-state".to_string(),
        pkce_verifier: "verifier".to_string(),
        redirect_target: "/".to_string(),
        created_at: now - Duration::minutes(6),
        expires_at: now - Duration::seconds(1),
    };
    h.store.insert_oauth_state(&record).await.unwrap();

    let err = h
        .oauth
        .complete_login("code1", "stale-state", "stale-state")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StateMismatch));
}

#[tokio::test]
async fn test_unknown_state_rejected() {
    let h = harness().await;
    let err = h
        .oauth
        .complete_login("code1", "never-issued", "never-issued")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StateMismatch));
}

#[tokio::test]
async fn test_unreachable_provider_is_provider_error() {
    // Nothing listens on the harness's default base address
    let h = harness().await;
    let (_, state) = h.oauth.initiate_login("/").await.unwrap();

    let err = h
        .oauth
        .complete_login("code1", &state, &state)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ProviderError(_)));
}

#[tokio::test]
async fn test_unverified_email_rejected_before_linking() {
    let base = spawn_provider(provider_router("g-2", "unverified@test.com", false)).await;
    let h = harness_with_base(&base).await;

    let (_, state) = h.oauth.initiate_login("/").await.unwrap();
    let err = h
        .oauth
        .complete_login("code1", &state, &state)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::IdentityUnverified));

    assert_eq!(count(&h.pool, "accounts").await, 0);
    assert_eq!(count(&h.pool, "provider_identities").await, 0);
}

#[tokio::test]
async fn test_failed_callback_clears_state_cookie() {
    let h = harness().await;
    let app_state = AppState {
        db: h.pool.clone(),
        config: test_app_config("http://127.0.0.1:9"),
        oauth_service: h.oauth.clone(),
        identity_linker: h.linker.clone(),
        session_service: h.sessions.clone(),
    };
    let app = super::auth_routes().layer(axum::Extension(app_state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let state_cookie_cleared = |resp: &reqwest::Response| {
        resp.headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .any(|v| {
                v.to_str()
                    .map_or(false, |s| s.starts_with("oauth_state=;") && s.contains("Max-Age=0"))
            })
    };

    // Provider denial
    let resp = reqwest::get(format!(
        "http://{}/auth/google/callback?error=access_denied",
        addr
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(state_cookie_cleared(&resp));

    // Missing state cookie
    let resp = reqwest::get(format!(
        "http://{}/auth/google/callback?code=c&state=s",
        addr
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(state_cookie_cleared(&resp));
}

// ---- identity linking ----

#[tokio::test]
async fn test_linker_rejects_unverified_identity() {
    let h = harness().await;

    let err = h
        .linker
        .resolve_account(&google_identity("g-3", "x@test.com", false))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::IdentityUnverified));
    assert_eq!(count(&h.pool, "accounts").await, 0);
    assert_eq!(count(&h.pool, "provider_identities").await, 0);
}

#[tokio::test]
async fn test_email_merge_preserves_password_credential() {
    let h = harness().await;

    let now = Utc::now();
    sqlx::query(
        "INSERT INTO accounts (id, email, display_name, password_hash, active, created_at, updated_at)
         VALUES ('U_EXIST1', 'a@x.com', 'Existing', 'h', 1, ?, ?)",
    )
    .bind(now)
    .bind(now)
    .execute(&h.pool)
    .await
    .unwrap();

    // Mixed-case, padded email resolves to the same account
    let (account, is_new) = h
        .linker
        .resolve_account(&google_identity("g-9", "  A@X.com ", true))
        .await
        .unwrap();

    assert!(!is_new);
    assert_eq!(account.id, "U_EXIST1");
    assert_eq!(account.password_hash.as_deref(), Some("h"));
    assert_eq!(account.display_name.as_deref(), Some("Existing"));

    let identity = h.store.find_identity("google", "g-9").await.unwrap().unwrap();
    assert_eq!(identity.account_id, "U_EXIST1");
    assert_eq!(count(&h.pool, "accounts").await, 1);
}

#[tokio::test]
async fn test_linking_idempotence() {
    let h = harness().await;
    let identity = google_identity("g-5", "same@test.com", true);

    let (first, is_new) = h.linker.resolve_account(&identity).await.unwrap();
    assert!(is_new);

    // Repeated and concurrent resolutions all land on the same account
    let mut handles = Vec::new();
    let linker = h.linker.clone();
    for _ in 0..8 {
        let linker = linker.clone();
        let identity = identity.clone();
        handles.push(tokio::spawn(async move {
            linker.resolve_account(&identity).await
        }));
    }
    for handle in handles {
        let (account, is_new) = handle.await.unwrap().unwrap();
        assert_eq!(account.id, first.id);
        assert!(!is_new);
    }

    assert_eq!(count(&h.pool, "accounts").await, 1);
    assert_eq!(count(&h.pool, "provider_identities").await, 1);
}

#[tokio::test]
async fn test_conflicting_identity_not_overwritten() {
    let h = harness().await;

    // Account A owns the subject, account B owns the email
    let (a, _) = h
        .linker
        .resolve_account(&google_identity("g-7", "a@test.com", true))
        .await
        .unwrap();
    let (b, _) = h
        .linker
        .resolve_account(&google_identity("g-8", "b@test.com", true))
        .await
        .unwrap();
    assert_ne!(a.id, b.id);

    // Subject g-7 now arrives claiming b's email
    let err = h
        .linker
        .resolve_account(&google_identity("g-7", "b@test.com", true))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::IdentityConflict));

    // Nothing was relinked
    let identity = h.store.find_identity("google", "g-7").await.unwrap().unwrap();
    assert_eq!(identity.account_id, a.id);
}

#[tokio::test]
async fn test_deactivated_account_refused() {
    let h = harness().await;

    let (account, _) = h
        .linker
        .resolve_account(&google_identity("g-10", "gone@test.com", true))
        .await
        .unwrap();

    sqlx::query("UPDATE accounts SET active = 0 WHERE id = ?")
        .bind(&account.id)
        .execute(&h.pool)
        .await
        .unwrap();

    let err = h
        .linker
        .resolve_account(&google_identity("g-10", "gone@test.com", true))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::IdentityConflict));
}

// ---- sessions ----

async fn issue_test_session(h: &Harness, with_tokens: bool) -> (super::models::Session, String) {
    let (account, _) = h
        .linker
        .resolve_account(&google_identity("g-s", "session@test.com", true))
        .await
        .unwrap();

    let tokens = ProviderTokens {
        access_token: "provider-access".to_string(),
        refresh_token: Some("provider-refresh".to_string()),
        expires_at: Utc::now() + Duration::hours(1),
    };
    h.sessions
        .issue_session(
            &account,
            with_tokens.then_some(&tokens),
            ClientMeta::default(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_validate_rejects_foreign_and_garbage_tokens() {
    let h = harness().await;
    let (_, _token) = issue_test_session(&h, false).await;

    assert!(matches!(
        h.sessions.validate_session("not-a-jwt").await.unwrap_err(),
        AuthError::InvalidToken
    ));

    // Minted under a different secret
    let other = SessionService::new(
        h.store.clone(),
        Arc::new(TokenVault::from_key(&TokenVault::generate_key()).unwrap()),
        h.oauth.clone(),
        "other-secret".to_string(),
        24,
    );
    let account = h.store.find_account_by_email("session@test.com").await.unwrap().unwrap();
    let (_, foreign_token) = other
        .issue_session(&account, None, ClientMeta::default())
        .await
        .unwrap();
    assert!(matches!(
        h.sessions.validate_session(&foreign_token).await.unwrap_err(),
        AuthError::InvalidToken
    ));
}

#[tokio::test]
async fn test_validate_reports_expired_session() {
    let h = harness().await;
    let (session, token) = issue_test_session(&h, false).await;

    sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
        .bind(Utc::now() - Duration::seconds(1))
        .bind(&session.id)
        .execute(&h.pool)
        .await
        .unwrap();

    assert!(matches!(
        h.sessions.validate_session(&token).await.unwrap_err(),
        AuthError::Expired
    ));
}

#[tokio::test]
async fn test_validate_honors_extended_expiry_past_token_exp() {
    let h = harness().await;
    let (account, _) = h
        .linker
        .resolve_account(&google_identity("g-s", "session@test.com", true))
        .await
        .unwrap();

    // A session extended after its original 24h: the token's exp claim is in
    // the past while the stored expiry is not. The row is authoritative.
    let now = Utc::now();
    let claims = Claims {
        sub: account.id.clone(),
        sid: "S_EXTND1".to_string(),
        iat: (now - Duration::hours(25)).timestamp(),
        exp: (now - Duration::hours(1)).timestamp(),
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(b"test-signing-secret"),
    )
    .unwrap();

    let session = Session {
        id: "S_EXTND1".to_string(),
        account_id: account.id.clone(),
        token: token.clone(),
        access_token_enc: None,
        refresh_token_enc: None,
        provider_token_expires_at: None,
        expires_at: now + Duration::hours(23),
        last_activity: now,
        user_agent: None,
        ip_address: None,
        created_at: now - Duration::hours(25),
    };
    h.store.insert_session(&session).await.unwrap();

    let context = h.sessions.validate_session(&token).await.unwrap();
    assert_eq!(context.session_id, "S_EXTND1");
    assert_eq!(context.account_id, account.id);
}

#[tokio::test]
async fn test_needs_provider_refresh_flag() {
    let h = harness().await;
    let (session, token) = issue_test_session(&h, true).await;

    // Tokens valid for an hour: no refresh needed
    let context = h.sessions.validate_session(&token).await.unwrap();
    assert!(!context.needs_provider_refresh);

    // Tokens expiring inside the five-minute window
    sqlx::query("UPDATE sessions SET provider_token_expires_at = ? WHERE id = ?")
        .bind(Utc::now() + Duration::minutes(2))
        .bind(&session.id)
        .execute(&h.pool)
        .await
        .unwrap();
    let context = h.sessions.validate_session(&token).await.unwrap();
    assert!(context.needs_provider_refresh);
}

#[tokio::test]
async fn test_extend_session_monotonic_and_bounded() {
    let h = harness().await;
    let (session, _) = issue_test_session(&h, false).await;

    // Shrink the expiry, then extend: it moves forward, never back
    sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
        .bind(Utc::now() + Duration::hours(1))
        .bind(&session.id)
        .execute(&h.pool)
        .await
        .unwrap();

    let before = Utc::now();
    let extended = h.sessions.extend_session(&session.id).await.unwrap();
    assert!(extended.expires_at > before + Duration::hours(1) - Duration::seconds(5));
    assert!(extended.expires_at <= before + Duration::hours(24) + Duration::seconds(5));

    // Extending again immediately never decreases the stored expiry
    let again = h.sessions.extend_session(&session.id).await.unwrap();
    assert!(again.expires_at >= extended.expires_at);
}

#[tokio::test]
async fn test_extend_expired_session_fails() {
    let h = harness().await;
    let (session, _) = issue_test_session(&h, false).await;

    sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
        .bind(Utc::now() - Duration::seconds(1))
        .bind(&session.id)
        .execute(&h.pool)
        .await
        .unwrap();

    assert!(matches!(
        h.sessions.extend_session(&session.id).await.unwrap_err(),
        AuthError::AlreadyExpired
    ));
}

#[tokio::test]
async fn test_record_activity_never_moves_backward() {
    let h = harness().await;
    let (session, _) = issue_test_session(&h, false).await;

    let later = Utc::now() + Duration::minutes(10);
    h.store.touch_activity(&session.id, later).await.unwrap();
    let earlier = Utc::now() - Duration::minutes(10);
    h.store.touch_activity(&session.id, earlier).await.unwrap();

    let stored = h.store.find_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.last_activity.timestamp(), later.timestamp());
}

#[tokio::test]
async fn test_terminate_session_idempotent() {
    let h = harness().await;
    let (session, token) = issue_test_session(&h, false).await;

    h.sessions.terminate_session(&session.id).await.unwrap();
    h.sessions.terminate_session(&session.id).await.unwrap();

    assert!(matches!(
        h.sessions.validate_session(&token).await.unwrap_err(),
        AuthError::InvalidToken
    ));
}

#[tokio::test]
async fn test_refresh_without_tokens_not_refreshable() {
    let h = harness().await;
    let (session, _) = issue_test_session(&h, false).await;

    assert!(matches!(
        h.sessions.refresh_provider_tokens(&session.id).await.unwrap_err(),
        AuthError::NotRefreshable
    ));
    // The session itself survives
    assert!(h.store.find_session(&session.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_refresh_success_rotates_stored_tokens() {
    let base = spawn_provider(provider_router("g-s", "session@test.com", true)).await;
    let h = harness_with_base(&base).await;
    let (session, _) = issue_test_session(&h, true).await;

    let old = h.store.find_session(&session.id).await.unwrap().unwrap();
    let refreshed = h.sessions.refresh_provider_tokens(&session.id).await.unwrap();

    // Fresh ciphertexts and expiry were stored
    assert_ne!(refreshed.access_token_enc, old.access_token_enc);
    assert!(refreshed.provider_token_expires_at.unwrap() > Utc::now() + Duration::minutes(50));
}

#[tokio::test]
async fn test_revoked_refresh_terminates_session() {
    let base = spawn_provider(revoking_provider_router()).await;
    let h = harness_with_base(&base).await;
    let (session, token) = issue_test_session(&h, true).await;

    let err = h
        .sessions
        .refresh_provider_tokens(&session.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Revoked));

    // Session validity does not outlive provider-side revocation
    assert!(h.store.find_session(&session.id).await.unwrap().is_none());
    assert!(matches!(
        h.sessions.validate_session(&token).await.unwrap_err(),
        AuthError::InvalidToken
    ));
}

// ---- sweeper ----

#[tokio::test]
async fn test_sweep_removes_expired_oauth_states() {
    use crate::common::config::SweeperConfig;
    use crate::services::sweeper::SweeperService;

    let h = harness().await;
    let now = Utc::now();

    for (state, expires_at) in [
        ("fresh", now + Duration::minutes(4)),
        ("stale", now - Duration::seconds(1)),
    ] {
        h.store
            .insert_oauth_state(&OauthStateRecord {
                state: state.to_string(),
                pkce_verifier: "v".to_string(),
                redirect_target: "/".to_string(),
                created_at: now - Duration::minutes(1),
                expires_at,
            })
            .await
            .unwrap();
    }

    let sweeper = SweeperService::new(
        h.store.clone(),
        SweeperConfig {
            oauth_state_interval: std::time::Duration::from_secs(300),
            session_interval: std::time::Duration::from_secs(86_400),
            inactivity_cutoff_days: 7,
        },
    );

    let removed = sweeper.sweep_oauth_states(now).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(count(&h.pool, "oauth_states").await, 1);
    assert!(h.store.consume_oauth_state("stale").await.unwrap().is_none());
}

#[tokio::test]
async fn test_sweep_removes_expired_and_inactive_sessions() {
    use crate::common::config::SweeperConfig;
    use crate::services::sweeper::SweeperService;

    let h = harness().await;
    let (session, _) = issue_test_session(&h, false).await;
    let now = Utc::now();

    // Long-inactive but not yet expired: removed by the inactivity sweep
    sqlx::query("UPDATE sessions SET last_activity = ?, expires_at = ? WHERE id = ?")
        .bind(now - Duration::days(8))
        .bind(now + Duration::hours(12))
        .bind(&session.id)
        .execute(&h.pool)
        .await
        .unwrap();

    let sweeper = SweeperService::new(
        h.store.clone(),
        SweeperConfig {
            oauth_state_interval: std::time::Duration::from_secs(300),
            session_interval: std::time::Duration::from_secs(86_400),
            inactivity_cutoff_days: 7,
        },
    );

    let (expired, inactive) = sweeper.sweep_sessions(now).await;
    assert_eq!(expired.unwrap(), 0);
    assert_eq!(inactive.unwrap(), 1);
    assert_eq!(count(&h.pool, "sessions").await, 0);

    // Expired sessions go too
    let (s2, _) = issue_test_session(&h, false).await;
    sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
        .bind(now - Duration::seconds(1))
        .bind(&s2.id)
        .execute(&h.pool)
        .await
        .unwrap();

    let (expired, _) = sweeper.sweep_sessions(now).await;
    assert_eq!(expired.unwrap(), 1);
    assert_eq!(count(&h.pool, "sessions").await, 0);
}
