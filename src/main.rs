// src/main.rs
use axum::{extract::Extension, Router};
use dotenv::dotenv;
use reqwest::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::time::Duration;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod auth;
mod common;
mod services;

use auth::linker::IdentityLinker;
use auth::oauth::OauthService;
use auth::session::SessionService;
use auth::store::AuthStore;
use common::{AppConfig, AppState};
use services::{SweeperService, TokenVault};

/// Provider calls never hang a caller: explicit timeout on all outbound
/// requests.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Missing signing or encryption secrets abort here, not per request.
    let config = AppConfig::from_env()?;
    let vault = Arc::new(TokenVault::from_key(&config.encryption_key)?);

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let http_client = Client::builder().timeout(PROVIDER_TIMEOUT).build()?;
    let store = AuthStore::new(pool.clone());

    let oauth_service = Arc::new(OauthService::new(
        config.oauth.clone(),
        store.clone(),
        http_client,
        config.oauth_state_ttl_minutes,
    ));
    info!("OauthService initialized");

    let identity_linker = Arc::new(IdentityLinker::new(store.clone()));
    info!("IdentityLinker initialized");

    let session_service = Arc::new(SessionService::new(
        store.clone(),
        vault,
        oauth_service.clone(),
        config.jwt_secret.clone(),
        config.session_ttl_hours,
    ));
    info!("SessionService initialized");

    let sweeper = SweeperService::new(store, config.sweeper.clone()).spawn();
    info!("Expiration sweeper started");

    // ========================================================================
    // APPLICATION STATE AND ROUTER
    // ========================================================================

    let app_state = AppState {
        db: pool,
        config: config.clone(),
        oauth_service,
        identity_linker,
        session_service,
    };

    let app = Router::new()
        .merge(auth::auth_routes())
        .layer(Extension(app_state))
        .layer({
            let origins: Vec<axum::http::HeaderValue> = config
                .cors_origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                ])
                .allow_credentials(true)
        })
        .layer(TraceLayer::new_for_http());

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    sweeper.shutdown().await;
    info!("Sweeper stopped");

    Ok(())
}
