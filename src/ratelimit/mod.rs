//! Rate limiting logic and state management.

mod clock;
mod limiter;
mod policy;
mod reclaimer;
mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{Decision, SlidingWindowLimiter};
pub use policy::{Policy, PolicyName};
pub use reclaimer::{sweep, Reclaimable, Reclaimer, SweepReport};
pub use registry::RateLimiterRegistry;
