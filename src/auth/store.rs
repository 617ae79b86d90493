//! Persistence for accounts, provider identities, oauth states, and sessions
//!
//! All SQL for the subsystem lives here. Invariants are enforced by the
//! database (unique constraints, atomic consume), never by in-process locks,
//! so the service stays correct behind a load balancer.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::models::{Account, OauthStateRecord, ProviderIdentity, Session};

/// Returns true when the error is a unique-constraint violation.
/// Concurrent writers treat this as "row now exists, re-read it".
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Store handle injected into the coordinator, linker, session manager,
/// and sweeper.
#[derive(Clone)]
pub struct AuthStore {
    pool: SqlitePool,
}

impl AuthStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ---- oauth states ----

    pub async fn insert_oauth_state(&self, record: &OauthStateRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO oauth_states (state, pkce_verifier, redirect_target, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.state)
        .bind(&record.pkce_verifier)
        .bind(&record.redirect_target)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomically consume a state record. The DELETE is the single-use
    /// guard: under concurrent replay exactly one caller gets the row back.
    /// Expiry is checked by the caller on the returned record.
    pub async fn consume_oauth_state(
        &self,
        state: &str,
    ) -> Result<Option<OauthStateRecord>, sqlx::Error> {
        sqlx::query_as::<_, OauthStateRecord>(
            r#"
            DELETE FROM oauth_states
            WHERE state = ?
            RETURNING state, pkce_verifier, redirect_target, created_at, expires_at
            "#,
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn sweep_expired_oauth_states(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // ---- accounts and provider identities ----

    pub async fn find_identity(
        &self,
        provider: &str,
        subject_id: &str,
    ) -> Result<Option<ProviderIdentity>, sqlx::Error> {
        sqlx::query_as::<_, ProviderIdentity>(
            "SELECT * FROM provider_identities WHERE provider = ? AND subject_id = ?",
        )
        .bind(provider)
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn find_account_by_id(&self, id: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Email must already be normalized by the caller.
    pub async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    /// Link a provider identity to an existing account. Fails with a
    /// unique violation if the identity or the per-provider slot is taken.
    pub async fn insert_identity(&self, identity: &ProviderIdentity) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO provider_identities
                (account_id, provider, subject_id, email, email_verified, linked_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&identity.account_id)
        .bind(&identity.provider)
        .bind(&identity.subject_id)
        .bind(&identity.email)
        .bind(identity.email_verified)
        .bind(identity.linked_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create a fresh account together with its first provider identity in
    /// one transaction, so no account ever exists without a credential.
    pub async fn create_account_with_identity(
        &self,
        account: &Account,
        identity: &ProviderIdentity,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, display_name, password_hash, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(&account.password_hash)
        .bind(account.active)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO provider_identities
                (account_id, provider, subject_id, email, email_verified, linked_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&identity.account_id)
        .bind(&identity.provider)
        .bind(&identity.subject_id)
        .bind(&identity.email)
        .bind(identity.email_verified)
        .bind(identity.linked_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    // ---- sessions ----

    pub async fn insert_session(&self, session: &Session) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO sessions
                (id, account_id, token, access_token_enc, refresh_token_enc,
                 provider_token_expires_at, expires_at, last_activity,
                 user_agent, ip_address, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.account_id)
        .bind(&session.token)
        .bind(&session.access_token_enc)
        .bind(&session.refresh_token_enc)
        .bind(session.provider_token_expires_at)
        .bind(session.expires_at)
        .bind(session.last_activity)
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_session(&self, id: &str) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Monotonic last-activity update: an older writer never decreases the
    /// stored value under concurrent requests.
    pub async fn touch_activity(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sessions SET last_activity = ? WHERE id = ? AND last_activity < ?")
            .bind(at)
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Move the session expiry forward. The WHERE guard makes the update a
    /// no-op on sessions that have already lapsed, and `new_expiry` can only
    /// advance the stored value.
    pub async fn extend_session(
        &self,
        id: &str,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET expires_at = ? WHERE id = ? AND expires_at > ? AND expires_at <= ?",
        )
        .bind(new_expiry)
        .bind(id)
        .bind(now)
        .bind(new_expiry)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_provider_tokens(
        &self,
        id: &str,
        access_token_enc: &str,
        refresh_token_enc: Option<&str>,
        provider_token_expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET access_token_enc = ?,
                refresh_token_enc = COALESCE(?, refresh_token_enc),
                provider_token_expires_at = ?
            WHERE id = ?
            "#,
        )
        .bind(access_token_enc)
        .bind(refresh_token_enc)
        .bind(provider_token_expires_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Idempotent: deleting a nonexistent session is not an error.
    pub async fn delete_session(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Long-inactive cleanup: removes sessions idle past the cutoff even if
    /// their expiry has not yet passed.
    pub async fn sweep_inactive_sessions(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_activity < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
