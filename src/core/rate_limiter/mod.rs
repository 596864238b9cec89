//! Bucket-based rate limiting
//!
//! Sliding-window RPM/RPD counters and per-minute TPM counters live in a
//! shared [`CounterStore`](crate::storage::CounterStore); circuit breakers
//! are process-local and created per bucket on first use.

mod backpressure;
mod clock;
mod limiter;
mod reporting;
mod tokens;
mod types;
mod window;


// Re-export public types
pub use backpressure::BackpressureController;
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::RateLimiter;
pub use types::{
    BucketUtilization, CheckOptions, CircuitHealth, HealthReport, HealthStatus, LimitKind,
    RateLimitMetadata, RateLimitResult, UsageStats, uptime_percentage,
};
