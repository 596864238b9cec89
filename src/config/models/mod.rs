//! Configuration data models
//!
//! This module defines all configuration structures used throughout the crate.

pub mod bucket;
pub mod rate_limit;
pub mod storage;

// Re-export all configuration types
pub use bucket::*;
pub use rate_limit::*;
pub use storage::*;

/// Default global safety margin (fraction of each limit held back)
pub fn default_safety_margin() -> f64 {
    0.1
}

/// Default namespace for keys in the shared store
pub fn default_key_prefix() -> String {
    "quota_guard".to_string()
}

/// Default Redis URL
pub fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

/// Default connection timeout in seconds
pub fn default_connection_timeout() -> u64 {
    5
}

/// Default maximum backpressure attempts
pub fn default_max_attempts() -> u32 {
    3
}

/// Default ceiling on a single backpressure wait, in seconds
pub fn default_max_wait_secs() -> f64 {
    30.0
}

/// Default backpressure jitter, in seconds
pub fn default_jitter_secs() -> f64 {
    1.0
}

/// Default consecutive failures before a circuit opens
pub fn default_failure_threshold() -> u32 {
    5
}

/// Default consecutive half-open successes before a circuit closes
pub fn default_success_threshold() -> u32 {
    2
}

/// Default open-circuit timeout in seconds
pub fn default_breaker_timeout_secs() -> u64 {
    60
}

/// Default for boolean switches that are on unless disabled
pub fn default_true() -> bool {
    true
}
