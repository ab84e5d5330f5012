//! Expiry sweeper.
//!
//! Periodically unsubscribes channels whose last subscribe request is older
//! than the TTL. A channel the caller keeps asking for is refreshed by the
//! registry and never swept.

use crate::connection::{ConnectionManager, SendOutcome};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Age after which an unrefreshed subscription is dropped.
    pub ttl_ms: u64,
    /// Time between sweeps.
    pub interval_ms: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 300_000,
            interval_ms: 60_000,
        }
    }
}

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub unsubscribed: usize,
    /// Left in place because there was no connection.
    pub deferred: usize,
    pub failed: usize,
}

pub struct ExpirySweeper {
    config: SweeperConfig,
    manager: Arc<ConnectionManager>,
}

impl ExpirySweeper {
    pub fn new(config: SweeperConfig, manager: Arc<ConnectionManager>) -> Self {
        Self { config, manager }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.config.ttl_ms)
    }

    /// Run until the manager shuts down.
    ///
    /// The first sweep happens one interval after start.
    pub async fn run(&self) {
        let token = self.manager.shutdown_token();
        let period = Duration::from_millis(self.config.interval_ms.max(1));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_ms = self.config.interval_ms,
            ttl_ms = self.config.ttl_ms,
            "Expiry sweeper started"
        );

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    if token.is_cancelled() {
                        break;
                    }
                    self.sweep_once().await;
                }
            }
        }

        info!("Expiry sweeper stopped");
    }

    /// Unsubscribe every expired channel once.
    ///
    /// A failure on one channel is logged and the rest still get swept;
    /// the failed entry stays in the registry for the next pass.
    pub async fn sweep_once(&self) -> SweepReport {
        self.sweep_at(Instant::now()).await
    }

    pub async fn sweep_at(&self, now: Instant) -> SweepReport {
        let expired = self.manager.registry().list_expired(now, self.ttl());
        let mut report = SweepReport {
            expired: expired.len(),
            ..Default::default()
        };

        if expired.is_empty() {
            debug!("Sweep found nothing to expire");
            return report;
        }

        for channel in &expired {
            match self.manager.send_unsubscribe(channel).await {
                Ok(SendOutcome::Sent) => {
                    info!(%channel, "Unsubscribed expired channel");
                    report.unsubscribed += 1;
                }
                Ok(SendOutcome::Skipped) => {}
                Ok(SendOutcome::NotConnected) => report.deferred += 1,
                Err(e) => {
                    warn!(%channel, error = %e, "Failed to unsubscribe expired channel");
                    report.failed += 1;
                }
            }
        }

        info!(
            expired = report.expired,
            unsubscribed = report.unsubscribed,
            deferred = report.deferred,
            failed = report.failed,
            "Sweep finished"
        );
        report
    }
}
