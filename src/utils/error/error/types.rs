//! Error types for the quota guard

use crate::core::rate_limiter::{LimitKind, RateLimitMetadata};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for the quota guard
pub type Result<T> = std::result::Result<T, QuotaError>;

/// Main error type for the quota guard
#[derive(Error, Debug)]
pub enum QuotaError {
    /// A bucket denied the request
    #[error("Rate limit exceeded for bucket {bucket}: {blocked_by} quota exhausted, retry after {retry_after}s")]
    RateLimitExceeded {
        bucket: String,
        blocked_by: LimitKind,
        retry_after: u64,
        metadata: Box<RateLimitMetadata>,
    },

    /// The bucket's circuit breaker is open; the underlying call was not attempted
    #[error(
        "Circuit breaker open for bucket {}: {} failures, estimated recovery in {}s",
        .bucket,
        .failure_count,
        .estimated_recovery.as_secs()
    )]
    CircuitBreakerOpen {
        bucket: String,
        failure_count: u32,
        estimated_recovery: Duration,
    },

    /// The shared counter store failed; requests are never let through in this state
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// No bucket with this id is configured
    #[error("Unknown bucket: {0}")]
    UnknownBucket(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller's deadline elapsed before the operation finished
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error returned by a protected call.
///
/// `Rejected` means the guard refused or abandoned the call (rate limited,
/// breaker open, backend down, deadline). `Failed` carries the underlying
/// call's own error after the breaker has recorded it.
#[derive(Error, Debug)]
pub enum CallError<E> {
    #[error(transparent)]
    Rejected(#[from] QuotaError),

    #[error("Protected call failed: {0}")]
    Failed(E),
}

impl<E> CallError<E> {
    /// Whether the guard itself refused the call
    pub fn is_rejected(&self) -> bool {
        matches!(self, CallError::Rejected(_))
    }

    /// The guard error, if the call was rejected
    pub fn rejection(&self) -> Option<&QuotaError> {
        match self {
            CallError::Rejected(err) => Some(err),
            CallError::Failed(_) => None,
        }
    }

    /// The underlying call's error, if the call actually ran and failed
    pub fn into_failure(self) -> Option<E> {
        match self {
            CallError::Failed(err) => Some(err),
            CallError::Rejected(_) => None,
        }
    }
}
