//! # quota-guard
//!
//! Bucket-based distributed rate limiting and circuit breaking for calls to
//! quota-constrained inference providers.
//!
//! ## Features
//!
//! - **Shared Counters**: Sliding-window RPM/RPD counters in Redis, updated by atomic Lua scripts
//! - **Token Budgets**: Per-minute TPM accounting for throughput-sensitive buckets
//! - **Safety Margins**: A fractional haircut applied once to every limit
//! - **Circuit Breakers**: A three-state breaker per bucket with a single half-open probe
//! - **Backpressure**: Bounded, jittered retries instead of immediate rejection
//! - **Reservation/Release**: Give back a slot whose call never reached the provider
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quota_guard::{CheckOptions, Config, RateLimiter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config/quota-guard.yaml").await?;
//!     let limiter = RateLimiter::connect(&config).await?;
//!
//!     let opts = CheckOptions::new().with_tokens(1_200);
//!     let answer = limiter
//!         .execute_with_protection("coordinators.anthropic", &opts, || async {
//!             // call the provider here
//!             Ok::<_, std::io::Error>("response")
//!         })
//!         .await?;
//!
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod storage;
pub mod utils;

// Re-export main types
pub use config::{BucketCategory, BucketConfig, BucketDefinition, BucketRegistry, Config, RateLimitConfig};
pub use core::rate_limiter::{
    BackpressureController, CheckOptions, Clock, HealthReport, HealthStatus, LimitKind,
    ManualClock, RateLimitMetadata, RateLimitResult, RateLimiter, SystemClock, UsageStats,
};
pub use storage::{CounterStore, MemoryStore, RedisPool};
pub use utils::error::{
    BreakerPermit, CallError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus,
    CircuitState, QuotaError, Result,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
