//! The process-wide set of named limiters.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::limiter::SlidingWindowLimiter;
use super::policy::PolicyName;
use super::reclaimer::{self, Reclaimable, Reclaimer, SweepReport};

/// One limiter per [`PolicyName`], plus the reclaimer that sweeps them.
///
/// Built once at the composition root and shared through `Arc`. The set of
/// policies is closed; there is no runtime registration.
pub struct RateLimiterRegistry {
    global: SlidingWindowLimiter,
    sensitive: SlidingWindowLimiter,
    search: SlidingWindowLimiter,
    reclaimer: Mutex<Option<Reclaimer>>,
}

impl RateLimiterRegistry {
    /// Create a registry driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a registry whose limiters all share `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let limiter =
            |name: PolicyName| SlidingWindowLimiter::with_clock(name.policy(), clock.clone());

        Self {
            global: limiter(PolicyName::Global),
            sensitive: limiter(PolicyName::Sensitive),
            search: limiter(PolicyName::Search),
            reclaimer: Mutex::new(None),
        }
    }

    /// The limiter for `name`.
    pub fn get(&self, name: PolicyName) -> &SlidingWindowLimiter {
        match name {
            PolicyName::Global => &self.global,
            PolicyName::Sensitive => &self.sensitive,
            PolicyName::Search => &self.search,
        }
    }

    /// The `global` limiter (100 requests per hour).
    pub fn global(&self) -> &SlidingWindowLimiter {
        &self.global
    }

    /// The `sensitive` limiter (10 requests per minute).
    pub fn sensitive(&self) -> &SlidingWindowLimiter {
        &self.sensitive
    }

    /// The `search` limiter (30 requests per minute).
    pub fn search(&self) -> &SlidingWindowLimiter {
        &self.search
    }

    /// Every limiter with its name, in [`PolicyName::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (PolicyName, &SlidingWindowLimiter)> + '_ {
        PolicyName::ALL.into_iter().map(move |name| (name, self.get(name)))
    }

    /// Run cleanup on every policy. A panic while cleaning one policy is
    /// logged and reported; the others are still swept.
    pub fn cleanup_all(&self) -> SweepReport {
        let targets: Vec<PolicyTarget<'_>> = self
            .iter()
            .map(|(name, limiter)| PolicyTarget { name, limiter })
            .collect();

        reclaimer::sweep(targets.iter().map(|t| t as &dyn Reclaimable))
    }

    /// Start the background reclaimer, sweeping every `interval`.
    ///
    /// Returns `false` if `interval` is zero or a reclaimer is already running.
    pub fn start(self: &Arc<Self>, interval: Duration) -> bool {
        if interval.is_zero() {
            warn!("Refusing to start reclaimer with a zero interval");
            return false;
        }

        let mut slot = self.reclaimer.lock();
        if slot.as_ref().is_some_and(|r| !r.is_finished()) {
            warn!("Reclaimer already running");
            return false;
        }

        *slot = Some(Reclaimer::spawn(Arc::downgrade(self), interval));
        info!(interval_secs = interval.as_secs(), "Rate limiter registry started");
        true
    }

    /// Stop the background reclaimer, if any, and wait for it to exit.
    pub async fn stop(&self) {
        let reclaimer = self.reclaimer.lock().take();
        if let Some(reclaimer) = reclaimer {
            reclaimer.stop().await;
            info!("Rate limiter registry stopped");
        }
    }

    /// Whether a reclaimer task is active.
    pub fn is_running(&self) -> bool {
        self.reclaimer
            .lock()
            .as_ref()
            .is_some_and(|r| !r.is_finished())
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct PolicyTarget<'a> {
    name: PolicyName,
    limiter: &'a SlidingWindowLimiter,
}

impl Reclaimable for PolicyTarget<'_> {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn reclaim(&self) -> usize {
        self.limiter.cleanup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;

    fn registry() -> (Arc<RateLimiterRegistry>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        (Arc::new(RateLimiterRegistry::with_clock(clock.clone())), clock)
    }

    #[test]
    fn test_registry_exposes_builtin_policies() {
        let (registry, _clock) = registry();

        assert_eq!(registry.global().policy(), PolicyName::Global.policy());
        assert_eq!(registry.sensitive().policy().max_requests(), 10);
        assert_eq!(registry.search().policy().max_requests(), 30);

        let names: Vec<_> = registry.iter().map(|(name, _)| name).collect();
        assert_eq!(names, PolicyName::ALL.to_vec());
    }

    #[test]
    fn test_policies_are_independent() {
        let (registry, _clock) = registry();

        for _ in 0..10 {
            assert!(registry.sensitive().is_allowed("1.2.3.4"));
        }
        assert!(!registry.sensitive().is_allowed("1.2.3.4"));

        assert!(registry.global().is_allowed("1.2.3.4"));
        assert!(registry.search().is_allowed("1.2.3.4"));
        assert_eq!(registry.global().remaining("1.2.3.4"), 99);
        assert_eq!(registry.search().remaining("1.2.3.4"), 29);
    }

    #[test]
    fn test_cleanup_all_respects_each_window() {
        let (registry, clock) = registry();

        registry.global().is_allowed("A");
        registry.sensitive().is_allowed("A");
        registry.search().is_allowed("B");

        // Past the one-minute windows but inside the hour
        clock.set(60_001);
        let report = registry.cleanup_all();

        assert_eq!(report.evicted, 2);
        assert!(report.failed.is_empty());
        assert_eq!(registry.global().tracked_identifiers(), 1);
        assert_eq!(registry.sensitive().tracked_identifiers(), 0);
        assert_eq!(registry.search().tracked_identifiers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reclaimer_sweeps_on_interval() {
        let (registry, clock) = registry();

        registry.search().is_allowed("stale");
        clock.set(120_000);

        assert!(registry.start(Duration::from_secs(300)));
        assert!(registry.is_running());

        // No sweep before the first interval elapses
        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(registry.search().tracked_identifiers(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(registry.search().tracked_identifiers(), 0);

        registry.stop().await;
        assert!(!registry.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_rejected() {
        let (registry, _clock) = registry();

        assert!(registry.start(Duration::from_secs(60)));
        assert!(!registry.start(Duration::from_secs(60)));

        registry.stop().await;
        // Stopping again is a no-op
        registry.stop().await;

        assert!(registry.start(Duration::from_secs(60)));
        registry.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_rejected() {
        let (registry, _clock) = registry();

        assert!(!registry.start(Duration::ZERO));
        assert!(!registry.is_running());

        // A valid interval still starts afterwards
        assert!(registry.start(Duration::from_secs(60)));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(registry.is_running());
        registry.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reclaimer_exits_when_registry_dropped() {
        let clock = Arc::new(ManualClock::new(0));
        let registry = Arc::new(RateLimiterRegistry::with_clock(clock));
        let reclaimer = Reclaimer::spawn(Arc::downgrade(&registry), Duration::from_secs(1));

        drop(registry);
        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;

        assert!(reclaimer.is_finished());
    }
}
