//! Background purge of expired blacklist entries
//!
//! A blacklisted token whose own expiry has passed is already rejected by
//! signature-time validation, so its row can go.

use chrono::Utc;
use simaling_db::{Database, DbError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default interval between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Periodic blacklist cleanup task
pub struct BlacklistSweeper {
    db: Database,
    interval: Duration,
}

impl BlacklistSweeper {
    pub fn new(db: Database, interval: Duration) -> Self {
        Self { db, interval }
    }

    /// Run until the cancellation token fires.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Blacklist sweeper starting");

        loop {
            if shutdown.is_cancelled() {
                info!("Blacklist sweeper shutting down");
                return;
            }

            if let Err(e) = self.sweep_once().await {
                warn!(error = %e, "Blacklist sweep failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Blacklist sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Delete every entry that expired before now
    pub async fn sweep_once(&self) -> Result<u64, DbError> {
        let removed = self.db.purge_expired_blacklist(Utc::now()).await?;
        metrics::counter!("simaling_blacklist_sweeps_total").increment(1);
        if removed > 0 {
            info!(removed, "Purged expired blacklist entries");
        } else {
            debug!("No expired blacklist entries");
        }
        Ok(removed)
    }
}
