// src/services/sweeper.rs
//! Expiration sweeper: periodic cleanup of expired oauth states and
//! expired or long-inactive sessions.
//!
//! Each category is one bounded DELETE with `now` passed in, so sweeps hold
//! no long-lived transaction, are idempotent, and can run redundantly from
//! multiple instances. Tests call the sweep methods directly with a chosen
//! clock value.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::auth::store::AuthStore;
use crate::common::config::SweeperConfig;

#[derive(Clone)]
pub struct SweeperService {
    store: AuthStore,
    config: SweeperConfig,
}

/// Handle for the spawned sweep loops. Dropping the shutdown sender stops
/// both loops within one tick.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Signal both loops to stop and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

impl SweeperService {
    pub fn new(store: AuthStore, config: SweeperConfig) -> Self {
        Self { store, config }
    }

    /// Delete oauth state rows whose expiry has passed.
    pub async fn sweep_oauth_states(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let removed = self.store.sweep_expired_oauth_states(now).await?;
        if removed > 0 {
            info!(removed, "Swept expired oauth states");
        }
        Ok(removed)
    }

    /// Delete expired sessions, then sessions idle past the inactivity
    /// cutoff. The two deletes are independent: failure of one does not
    /// block the other.
    pub async fn sweep_sessions(&self, now: DateTime<Utc>) -> (Result<u64, sqlx::Error>, Result<u64, sqlx::Error>) {
        let expired = self.store.sweep_expired_sessions(now).await;
        if let Ok(removed) = &expired {
            if *removed > 0 {
                info!(removed, "Swept expired sessions");
            }
        }

        let cutoff = now - Duration::days(self.config.inactivity_cutoff_days);
        let inactive = self.store.sweep_inactive_sessions(cutoff).await;
        if let Ok(removed) = &inactive {
            if *removed > 0 {
                info!(removed, "Swept long-inactive sessions");
            }
        }

        (expired, inactive)
    }

    /// Spawn both sweep loops. Each loop ticks on its own interval and exits
    /// when the shutdown signal fires, without waiting out the current tick.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state_sweeper = self.clone();
        let mut state_shutdown = shutdown_rx.clone();
        let state_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(state_sweeper.config.oauth_state_interval);
            // First tick fires immediately; skip it so startup is quiet.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = state_sweeper.sweep_oauth_states(Utc::now()).await {
                            error!(error = %e, "Oauth state sweep failed");
                        }
                    }
                    _ = state_shutdown.changed() => {
                        info!("Oauth state sweeper stopping");
                        break;
                    }
                }
            }
        });

        let session_sweeper = self;
        let mut session_shutdown = shutdown_rx;
        let session_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(session_sweeper.config.session_interval);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let (expired, inactive) = session_sweeper.sweep_sessions(Utc::now()).await;
                        if let Err(e) = expired {
                            error!(error = %e, "Expired session sweep failed");
                        }
                        if let Err(e) = inactive {
                            error!(error = %e, "Inactive session sweep failed");
                        }
                    }
                    _ = session_shutdown.changed() => {
                        info!("Session sweeper stopping");
                        break;
                    }
                }
            }
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            tasks: vec![state_task, session_task],
        }
    }
}
