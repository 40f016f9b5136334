//! Rate limit policies and the closed set of policy names.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QuotawardError, Result};

/// An immutable `(max_requests, window)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Policy {
    max_requests: u32,
    window_ms: i64,
}

impl Policy {
    /// Create a policy, rejecting a zero limit or a zero window.
    pub fn new(max_requests: u32, window: Duration) -> Result<Self> {
        if max_requests == 0 {
            return Err(QuotawardError::InvalidPolicy(
                "max_requests must be greater than zero".to_string(),
            ));
        }
        let window_ms = i64::try_from(window.as_millis()).map_err(|_| {
            QuotawardError::InvalidPolicy(format!("window {:?} is too large", window))
        })?;
        if window_ms == 0 {
            return Err(QuotawardError::InvalidPolicy(
                "window must be at least one millisecond".to_string(),
            ));
        }
        Ok(Self {
            max_requests,
            window_ms,
        })
    }

    /// Compile-time constructor for the built-in policies.
    const fn fixed(max_requests: u32, window_ms: i64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }

    /// Maximum admitted requests per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Window length in milliseconds.
    pub fn window_millis(&self) -> i64 {
        self.window_ms
    }

    /// Window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms as u64)
    }
}

/// The named policies used by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyName {
    /// Site-wide ceiling: 100 requests per hour
    Global,
    /// Form submissions and other abuse-prone endpoints: 10 per minute
    Sensitive,
    /// Search and metadata lookups: 30 per minute
    Search,
}

impl PolicyName {
    /// Every policy name, in registry order.
    pub const ALL: [PolicyName; 3] = [
        PolicyName::Global,
        PolicyName::Sensitive,
        PolicyName::Search,
    ];

    /// The fixed thresholds for this policy.
    pub fn policy(&self) -> Policy {
        match self {
            PolicyName::Global => Policy::fixed(100, 3_600_000),
            PolicyName::Sensitive => Policy::fixed(10, 60_000),
            PolicyName::Search => Policy::fixed(30, 60_000),
        }
    }

    /// Lowercase name as used in URLs and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyName::Global => "global",
            PolicyName::Sensitive => "sensitive",
            PolicyName::Search => "search",
        }
    }
}

impl fmt::Display for PolicyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyName {
    type Err = QuotawardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(PolicyName::Global),
            "sensitive" => Ok(PolicyName::Sensitive),
            "search" => Ok(PolicyName::Search),
            other => Err(QuotawardError::UnknownPolicy(other.to_string())),
        }
    }
}
