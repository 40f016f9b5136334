//! Background sweeping of stale request logs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::registry::RateLimiterRegistry;

/// Something the reclaimer can sweep.
pub trait Reclaimable {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Evict stale state, returning how many entries were dropped.
    fn reclaim(&self) -> usize;
}

/// Result of one pass over all targets.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Identifiers evicted across all targets
    pub evicted: usize,
    /// Targets whose cleanup panicked
    pub failed: Vec<String>,
}

/// Reclaim every target, isolating panics so one failure does not stop the
/// rest of the sweep.
pub fn sweep<'a, I>(targets: I) -> SweepReport
where
    I: IntoIterator<Item = &'a dyn Reclaimable>,
{
    let mut report = SweepReport::default();

    for target in targets {
        match panic::catch_unwind(AssertUnwindSafe(|| target.reclaim())) {
            Ok(evicted) => {
                if evicted > 0 {
                    debug!(policy = target.name(), evicted = evicted, "Evicted stale identifiers");
                }
                report.evicted += evicted;
            }
            Err(_) => {
                error!(policy = target.name(), "Cleanup panicked, continuing sweep");
                report.failed.push(target.name().to_string());
            }
        }
    }

    report
}

/// Handle to a running reclaimer task.
pub struct Reclaimer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Reclaimer {
    /// Spawn a task that sweeps `registry` every `period`.
    ///
    /// The first sweep happens one period after spawning. The task exits on
    /// [`Reclaimer::stop`] or once the registry has been dropped. `period`
    /// must be non-zero; [`RateLimiterRegistry::start`] checks this.
    pub fn spawn(registry: Weak<RateLimiterRegistry>, period: Duration) -> Self {
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(period_secs = period.as_secs(), "Reclaimer started");

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(registry) = registry.upgrade() else {
                            warn!("Registry dropped, reclaimer exiting");
                            break;
                        };
                        let report = registry.cleanup_all();
                        debug!(
                            evicted = report.evicted,
                            failed = report.failed.len(),
                            "Sweep complete"
                        );
                    }
                }
            }

            info!("Reclaimer stopped");
        });

        Self { token, handle }
    }

    /// Cancel the task and wait for it to finish.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Reclaimer task ended abnormally");
        }
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
