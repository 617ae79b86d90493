//! Identity linker: resolves a normalized provider identity to a local
//! account, creating or linking as needed.
//!
//! Uniqueness is enforced by the database constraints on (provider,
//! subject_id) and on account email; a concurrent writer that loses the
//! insert race re-reads the winner's row instead of surfacing an error, so
//! resolving the same identity N times concurrently yields exactly one
//! account and one identity row.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::error::AuthError;
use super::models::{Account, NormalizedIdentity, ProviderIdentity};
use super::store::{is_unique_violation, AuthStore};
use crate::common::helpers::safe_email_log;
use crate::common::id_generator::generate_account_id;

pub struct IdentityLinker {
    store: AuthStore,
}

impl IdentityLinker {
    pub fn new(store: AuthStore) -> Self {
        Self { store }
    }

    /// Resolve an identity to an account. Returns the account and whether it
    /// was created by this call.
    pub async fn resolve_account(
        &self,
        identity: &NormalizedIdentity,
    ) -> Result<(Account, bool), AuthError> {
        // The coordinator rejects unverified identities before resolution,
        // but the linker is also callable directly and must hold the same
        // line: unverified identities never create or touch accounts.
        if !identity.email_verified {
            return Err(AuthError::IdentityUnverified);
        }

        // One retry: a lost insert race is re-read, not surfaced.
        for attempt in 0..2 {
            match self.try_resolve(identity).await {
                Err(AuthError::Database(e)) if is_unique_violation(&e) && attempt == 0 => {
                    debug!("Lost identity insert race, re-reading");
                    continue;
                }
                result => return result,
            }
        }
        unreachable!("resolution retries exhausted");
    }

    async fn try_resolve(
        &self,
        identity: &NormalizedIdentity,
    ) -> Result<(Account, bool), AuthError> {
        // Fast path: returning oauth user
        if let Some(existing) = self
            .store
            .find_identity(&identity.provider, &identity.subject_id)
            .await?
        {
            let account = self
                .store
                .find_account_by_id(&existing.account_id)
                .await?
                .ok_or_else(|| {
                    error!(
                        account_id = %existing.account_id,
                        provider = %identity.provider,
                        "Provider identity references a missing account"
                    );
                    AuthError::IdentityConflict
                })?;

            // An email mismatch between the stored link and a fresh email
            // lookup means two accounts claim this identity. Never guessed.
            if let Some(by_email) = self.store.find_account_by_email(&identity.email).await? {
                if by_email.id != account.id {
                    error!(
                        linked_account = %account.id,
                        email_account = %by_email.id,
                        provider = %identity.provider,
                        subject_id = %identity.subject_id,
                        "Identity linked to a different account than its email resolves to"
                    );
                    return Err(AuthError::IdentityConflict);
                }
            }

            self.reject_inactive(&account, identity)?;

            debug!(account_id = %account.id, "Resolved returning oauth user");
            return Ok((account, false));
        }

        // Merge path: an account already owns this email
        if let Some(account) = self.store.find_account_by_email(&identity.email).await? {
            self.reject_inactive(&account, identity)?;

            let link = ProviderIdentity {
                account_id: account.id.clone(),
                provider: identity.provider.clone(),
                subject_id: identity.subject_id.clone(),
                email: identity.email.clone(),
                email_verified: identity.email_verified,
                linked_at: Utc::now(),
            };

            match self.store.insert_identity(&link).await {
                Ok(()) => {
                    info!(
                        account_id = %account.id,
                        provider = %identity.provider,
                        email = %safe_email_log(&identity.email),
                        "Linked provider identity to existing account"
                    );
                    // All other account fields (password credential, display
                    // name, active flag) stay untouched by linking.
                    return Ok((account, false));
                }
                Err(e) if is_unique_violation(&e) => {
                    // Either a concurrent resolution won with the same
                    // subject, or this account already holds a different
                    // identity for the provider.
                    if let Some(existing) = self
                        .store
                        .find_identity(&identity.provider, &identity.subject_id)
                        .await?
                    {
                        if existing.account_id == account.id {
                            return Ok((account, false));
                        }
                        error!(
                            account_id = %account.id,
                            other_account_id = %existing.account_id,
                            provider = %identity.provider,
                            "Identity concurrently linked to a different account"
                        );
                        return Err(AuthError::IdentityConflict);
                    }
                    error!(
                        account_id = %account.id,
                        provider = %identity.provider,
                        "Account already holds a different identity for this provider"
                    );
                    return Err(AuthError::IdentityConflict);
                }
                Err(e) => return Err(e.into()),
            }
        }

        // New user: account plus identity in one transaction, so no account
        // ever exists without a credential.
        let now = Utc::now();
        let account = Account {
            id: generate_account_id(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            password_hash: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let link = ProviderIdentity {
            account_id: account.id.clone(),
            provider: identity.provider.clone(),
            subject_id: identity.subject_id.clone(),
            email: identity.email.clone(),
            email_verified: identity.email_verified,
            linked_at: now,
        };

        self.store
            .create_account_with_identity(&account, &link)
            .await?;

        info!(
            account_id = %account.id,
            email = %safe_email_log(&account.email),
            provider = %identity.provider,
            "Created new account via oauth"
        );
        Ok((account, true))
    }

    /// Oauth login against a deactivated account is refused rather than
    /// guessed at.
    fn reject_inactive(
        &self,
        account: &Account,
        identity: &NormalizedIdentity,
    ) -> Result<(), AuthError> {
        if account.active {
            return Ok(());
        }
        warn!(
            account_id = %account.id,
            provider = %identity.provider,
            "Oauth login against deactivated account refused"
        );
        Err(AuthError::IdentityConflict)
    }
}
