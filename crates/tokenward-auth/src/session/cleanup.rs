//! Expired session sweeper.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{error, info, trace};

use tokenward_core::result::AppResult;

use super::registry::SessionRegistry;

/// Periodically purges session records that have passed their expiry.
///
/// Expired records are already invisible to reads; this only reclaims
/// storage. Revocation never depends on it.
#[derive(Debug, Clone)]
pub struct SessionCleanup {
    registry: SessionRegistry,
    interval: Duration,
}

impl SessionCleanup {
    /// Creates a sweeper that runs every `interval_seconds`.
    pub fn new(registry: SessionRegistry, interval_seconds: u64) -> Self {
        Self {
            registry,
            interval: Duration::from_secs(interval_seconds.max(1)),
        }
    }

    /// Runs one sweep and returns the number of records removed.
    pub async fn run_cleanup(&self) -> AppResult<u64> {
        let removed = self.registry.delete_expired().await?;
        if removed > 0 {
            info!(removed, "Expired session cleanup completed");
        } else {
            trace!("No expired sessions to clean up");
        }
        Ok(removed)
    }

    /// Sweeps on every tick until `cancel` flips to `true` or its sender
    /// is dropped.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Session cleanup started"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cleanup().await {
                        error!(error = %e, "Expired session cleanup failed");
                    }
                }
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        info!("Session cleanup shutting down");
                        break;
                    }
                }
            }
        }
    }
}
