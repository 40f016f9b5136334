//! Core sliding-window rate limiter.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::policy::Policy;

/// Outcome of a combined admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// The policy's request ceiling
    pub limit: u32,
    /// Quota left in the current window after this request
    pub remaining: u32,
    /// Milliseconds until the oldest entry leaves the window (denials only)
    pub retry_after_ms: Option<i64>,
}

/// A sliding-window limiter for one policy.
///
/// Every identifier owns an ordered log of request timestamps. A request is
/// admitted when fewer than `max_requests` timestamps fall inside
/// `(now - window, now]`. The log for one identifier is only touched while
/// its map shard is write-locked, so concurrent checks against the same
/// identifier cannot both observe a stale count.
pub struct SlidingWindowLimiter {
    /// Timestamp logs indexed by identifier
    logs: DashMap<String, VecDeque<i64>>,
    /// Limit and window, fixed at construction
    policy: Policy,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    /// Create a limiter driven by the system clock.
    pub fn new(policy: Policy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Create a limiter driven by the given clock.
    pub fn with_clock(policy: Policy, clock: Arc<dyn Clock>) -> Self {
        Self {
            logs: DashMap::new(),
            policy,
            clock,
        }
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Decide whether a request from `identifier` may proceed, recording it
    /// if so. Denied attempts are not recorded.
    pub fn is_allowed(&self, identifier: &str) -> bool {
        self.check(identifier).allowed
    }

    /// Quota left for `identifier` in the current window.
    ///
    /// Stale entries are pruned first, so the figure never overcounts.
    /// Unknown identifiers report the full quota and are not tracked.
    pub fn remaining(&self, identifier: &str) -> u32 {
        let max = self.policy.max_requests();
        let cutoff = self.cutoff();

        match self.logs.get_mut(identifier) {
            Some(mut log) => {
                prune(&mut log, cutoff);
                max.saturating_sub(log.len() as u32)
            }
            None => max,
        }
    }

    /// Admit-or-deny and report the remaining quota as one atomic step.
    pub fn check(&self, identifier: &str) -> Decision {
        let now = self.clock.now_millis();
        let window_ms = self.policy.window_millis();
        let max = self.policy.max_requests() as usize;

        trace!(identifier = %identifier, now = now, "Checking rate limit");

        let (allowed, len, oldest) = {
            let mut log = self
                .logs
                .entry(identifier.to_owned())
                .or_insert_with(|| {
                    debug!(
                        identifier = %identifier,
                        limit = max,
                        window_ms = window_ms,
                        "Creating new request log"
                    );
                    VecDeque::new()
                });

            prune(&mut log, now - window_ms);

            let allowed = log.len() < max;
            if allowed {
                log.push_back(now);
            }
            (allowed, log.len(), log.front().copied())
        };

        let retry_after_ms = if allowed {
            None
        } else {
            debug!(identifier = %identifier, count = len, limit = max, "Rate limit exceeded");
            oldest.map(|t| (t + window_ms - now).max(0))
        };

        Decision {
            allowed,
            limit: max as u32,
            remaining: max.saturating_sub(len) as u32,
            retry_after_ms,
        }
    }

    /// Prune every log and drop identifiers whose logs end up empty.
    ///
    /// Returns the number of identifiers evicted.
    pub fn cleanup(&self) -> usize {
        let cutoff = self.cutoff();
        let mut evicted = 0;

        self.logs.retain(|_, log| {
            prune(log, cutoff);
            if log.is_empty() {
                evicted += 1;
                false
            } else {
                true
            }
        });

        evicted
    }

    /// Number of identifiers currently tracked.
    pub fn tracked_identifiers(&self) -> usize {
        self.logs.len()
    }

    fn cutoff(&self) -> i64 {
        self.clock.now_millis() - self.policy.window_millis()
    }
}

/// Drop every timestamp at or before `cutoff`.
fn prune(log: &mut VecDeque<i64>, cutoff: i64) {
    // Wall clocks can step backwards, so scan instead of popping the front.
    log.retain(|&t| t > cutoff);
}
