//! Rate limiting configuration

use super::*;
use crate::utils::error::CircuitBreakerConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Fraction of every limit held back as headroom, in `[0, 0.5)`
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f64,
    /// Namespace for keys in the shared store
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Retry behavior for denied requests
    #[serde(default)]
    pub backpressure: BackpressureConfig,
    /// Per-bucket circuit breaker settings
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    /// Bucket definitions keyed by bucket id
    #[serde(default)]
    pub buckets: BTreeMap<String, BucketDefinition>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            safety_margin: default_safety_margin(),
            key_prefix: default_key_prefix(),
            backpressure: BackpressureConfig::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            buckets: BTreeMap::new(),
        }
    }
}

impl RateLimitConfig {
    /// Add or replace a bucket definition
    pub fn with_bucket(mut self, id: impl Into<String>, definition: BucketDefinition) -> Self {
        self.buckets.insert(id.into(), definition);
        self
    }

    pub fn with_safety_margin(mut self, margin: f64) -> Self {
        self.safety_margin = margin;
        self
    }
}

/// Backpressure (bounded retry) configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackpressureConfig {
    /// Retry denied requests instead of failing immediately
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Total checks per call, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Ceiling on a single wait, in seconds
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: f64,
    /// Upper bound of the uniform random delay added to each wait, in seconds
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: f64,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            max_wait_secs: default_max_wait_secs(),
            jitter_secs: default_jitter_secs(),
        }
    }
}

impl BackpressureConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn max_wait(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_wait_secs).unwrap_or(Duration::ZERO)
    }

    pub fn jitter(&self) -> Duration {
        Duration::try_from_secs_f64(self.jitter_secs).unwrap_or(Duration::ZERO)
    }
}

/// Circuit breaker configuration as written in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open a circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close a circuit
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Seconds a circuit stays open before probing
    #[serde(default = "default_breaker_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_secs: default_breaker_timeout_secs(),
        }
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            success_threshold: settings.success_threshold,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}
