//! Rate limiter types and data structures

use crate::utils::error::{CircuitBreakerStatus, CircuitState, QuotaError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Quota dimension that denied a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKind {
    /// Requests per minute
    Rpm,
    /// Requests per day
    Rpd,
    /// Tokens per minute
    Tpm,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Rpm => "rpm",
            LimitKind::Rpd => "rpd",
            LimitKind::Tpm => "tpm",
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time usage snapshot for a bucket.
///
/// Limits are the effective limits, after the safety margin was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitMetadata {
    pub bucket: String,
    pub model: Option<String>,
    pub provider: String,
    pub rpm_limit: u64,
    pub rpm_used: u64,
    pub rpm_remaining: u64,
    pub rpd_limit: u64,
    pub rpd_used: u64,
    pub rpd_remaining: u64,
    pub tpm_limit: Option<u64>,
    pub tpm_used: Option<u64>,
    pub tpm_remaining: Option<u64>,
    pub reset_time_rpm: DateTime<Utc>,
    pub reset_time_rpd: DateTime<Utc>,
    pub reset_time_tpm: Option<DateTime<Utc>>,
    pub safety_margin: f64,
}

impl RateLimitMetadata {
    /// RPM usage as a percentage of the effective limit
    pub fn rpm_utilization(&self) -> f64 {
        utilization(self.rpm_used, self.rpm_limit)
    }

    /// RPD usage as a percentage of the effective limit
    pub fn rpd_utilization(&self) -> f64 {
        utilization(self.rpd_used, self.rpd_limit)
    }
}

fn utilization(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    (used as f64 / limit as f64) * 100.0
}

/// Outcome of a single check-and-consume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Usage snapshot taken during the check
    pub metadata: RateLimitMetadata,
    /// Seconds until the blocking window resets (only set when not allowed)
    pub retry_after: Option<u64>,
    /// Which quota denied the request (only set when not allowed)
    pub blocked_by: Option<LimitKind>,
    /// Handle for releasing the reservation (only set when allowed)
    pub token_identifier: Option<String>,
}

impl RateLimitResult {
    pub(crate) fn allowed(metadata: RateLimitMetadata, token_identifier: String) -> Self {
        Self {
            allowed: true,
            metadata,
            retry_after: None,
            blocked_by: None,
            token_identifier: Some(token_identifier),
        }
    }

    pub(crate) fn denied(metadata: RateLimitMetadata, blocked_by: LimitKind, retry_after: u64) -> Self {
        Self {
            allowed: false,
            metadata,
            retry_after: Some(retry_after),
            blocked_by: Some(blocked_by),
            token_identifier: None,
        }
    }

    /// Convert a denial into the error surfaced to callers
    pub fn into_error(self) -> QuotaError {
        QuotaError::RateLimitExceeded {
            bucket: self.metadata.bucket.clone(),
            blocked_by: self.blocked_by.unwrap_or(LimitKind::Rpm),
            retry_after: self.retry_after.unwrap_or(1),
            metadata: Box::new(self.metadata),
        }
    }
}

/// Per-call options for checks and protected calls
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Estimated token usage, checked against the bucket's TPM limit
    pub token_count: Option<u64>,
    /// Abort the check, retry loop, and protected call at this instant
    pub deadline: Option<Instant>,
}

impl CheckOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(mut self, token_count: u64) -> Self {
        self.token_count = Some(token_count);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }
}

/// Aggregated usage across every configured bucket
#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    pub buckets: BTreeMap<String, RateLimitMetadata>,
    pub circuits: BTreeMap<String, CircuitBreakerStatus>,
    pub total_requests_today: u64,
    pub total_requests_this_minute: u64,
    pub uptime_percentage: f64,
    pub last_updated: DateTime<Utc>,
}

/// `100 × (1 − open/total)`; no circuits means full uptime
pub fn uptime_percentage<'a, I>(states: I) -> f64
where
    I: IntoIterator<Item = &'a CircuitState>,
{
    let (open, total) = states.into_iter().fold((0usize, 0usize), |(open, total), state| {
        (open + usize::from(*state == CircuitState::Open), total + 1)
    });
    if total == 0 {
        return 100.0;
    }
    100.0 * (1.0 - open as f64 / total as f64)
}

/// Overall health levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Backend reachable and every circuit closed
    Healthy,
    /// Backend reachable, at least one circuit open or probing
    Degraded,
    /// Backend unreachable; checks fail closed
    Unhealthy,
}

/// Health of a single circuit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitHealth {
    pub state: CircuitState,
    pub healthy: bool,
}

/// Window utilization of a single bucket, in percent of the effective limit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketUtilization {
    pub rpm_utilization: f64,
    pub rpd_utilization: f64,
}

/// Health check report
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall: HealthStatus,
    pub backend_reachable: bool,
    pub circuits: BTreeMap<String, CircuitHealth>,
    pub rate_limits: BTreeMap<String, BucketUtilization>,
    pub timestamp: DateTime<Utc>,
}
