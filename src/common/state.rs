// Application state shared across all modules
//
// Every service is constructed once in main and injected here; there is no
// process-wide database handle.

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::linker::IdentityLinker;
use crate::auth::oauth::OauthService;
use crate::auth::session::SessionService;
use crate::common::config::AppConfig;

/// Application state containing database pool, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: AppConfig,
    pub oauth_service: Arc<OauthService>,
    pub identity_linker: Arc<IdentityLinker>,
    pub session_service: Arc<SessionService>,
}
