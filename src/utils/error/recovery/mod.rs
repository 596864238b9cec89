//! Failure isolation for provider calls
//!
//! Circuit breaker state is process-local: each instance decides on its own
//! when a bucket's provider is unhealthy, while request counting is shared.

mod circuit_breaker;
mod types;

pub use circuit_breaker::{BreakerPermit, CircuitBreaker};
pub use types::{CircuitBreakerConfig, CircuitBreakerStatus, CircuitState};
