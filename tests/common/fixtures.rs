//! Limiter fixtures

use chrono::{DateTime, Utc};
use quota_guard::config::{BackpressureConfig, CircuitBreakerSettings};
use quota_guard::{BucketDefinition, ManualClock, MemoryStore, RateLimitConfig, RateLimiter};
use std::sync::Arc;

/// Fixed start time, 20 seconds past a minute boundary
pub fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Three buckets, one per naming group, margin 0.2 and no retries
pub fn bucket_config() -> RateLimitConfig {
    RateLimitConfig {
        backpressure: BackpressureConfig::disabled(),
        circuit_breaker: CircuitBreakerSettings {
            failure_threshold: 3,
            success_threshold: 1,
            timeout_secs: 5,
        },
        ..RateLimitConfig::default()
    }
    .with_safety_margin(0.2)
    .with_bucket(
        "coordinators.anthropic",
        BucketDefinition::new(10, 1000).with_model("claude-sonnet"),
    )
    .with_bucket("internal.summarizer", BucketDefinition::new(50, 5))
    .with_bucket(
        "subagents.researcher",
        BucketDefinition::new(100, 1000).with_tpm(10_000),
    )
}

/// A limiter on a fresh in-memory store with a controllable clock
pub struct TestLimiter {
    pub limiter: Arc<RateLimiter>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
}

impl TestLimiter {
    pub fn new() -> Self {
        Self::with_config(&bucket_config())
    }

    pub fn with_config(config: &RateLimitConfig) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::new(config, store.clone(), clock.clone()).unwrap();
        Self {
            limiter: Arc::new(limiter),
            clock,
            store,
        }
    }
}

impl Default for TestLimiter {
    fn default() -> Self {
        Self::new()
    }
}
