// src/common/migrations.rs
//! Database schema management
//!
//! Creates the four tables this subsystem owns. Uniqueness invariants
//! (account email, provider subject, session token) live here as constraints
//! so they hold across multiple service instances, not in process memory.

use sqlx::SqlitePool;
use tracing::info;

/// Create all tables and indexes if they do not exist
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    create_account_tables(pool).await?;
    create_auth_tables(pool).await?;
    create_indexes(pool).await?;

    info!("Database migration completed");
    Ok(())
}

async fn create_account_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Accounts are deactivated, never hard-deleted, by this subsystem.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            display_name TEXT,
            password_hash TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One identity per account per provider; (provider, subject_id) globally
    // unique. Read-only after first-time linking.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS provider_identities (
            account_id TEXT NOT NULL REFERENCES accounts(id),
            provider TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            email TEXT NOT NULL,
            email_verified INTEGER NOT NULL,
            linked_at TEXT NOT NULL,
            UNIQUE (provider, subject_id),
            UNIQUE (account_id, provider)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_auth_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Single-use CSRF/PKCE records; consumed atomically on callback or
    // reclaimed by the sweeper after expiry.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS oauth_states (
            state TEXT PRIMARY KEY,
            pkce_verifier TEXT NOT NULL,
            redirect_target TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES accounts(id),
            token TEXT NOT NULL UNIQUE,
            access_token_enc TEXT,
            refresh_token_enc TEXT,
            provider_token_expires_at TEXT,
            expires_at TEXT NOT NULL,
            last_activity TEXT NOT NULL,
            user_agent TEXT,
            ip_address TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_provider_identities_account ON provider_identities(account_id)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_account ON sessions(account_id)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_last_activity ON sessions(last_activity)",
        "CREATE INDEX IF NOT EXISTS idx_oauth_states_expires_at ON oauth_states(expires_at)",
    ];

    for sql in indexes {
        sqlx::query(sql).execute(pool).await?;
    }

    Ok(())
}
