//! Helper functions for creating and classifying errors

use super::types::QuotaError;
use std::time::Duration;

impl QuotaError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::BackendUnavailable(message.into())
    }

    pub fn unknown_bucket<S: Into<String>>(bucket: S) -> Self {
        Self::UnknownBucket(bucket.into())
    }

    pub fn deadline<S: Into<String>>(message: S) -> Self {
        Self::DeadlineExceeded(message.into())
    }

    pub fn circuit_open<S: Into<String>>(
        bucket: S,
        failure_count: u32,
        estimated_recovery: Duration,
    ) -> Self {
        Self::CircuitBreakerOpen {
            bucket: bucket.into(),
            failure_count,
            estimated_recovery,
        }
    }
}

impl QuotaError {
    /// Routine denial by a bucket
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. })
    }

    /// Routine rejection by an open breaker
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitBreakerOpen { .. })
    }

    /// Infrastructure incident rather than an expected condition
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::Io(_))
    }

    /// Seconds the caller should wait before trying the same bucket again
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            Self::CircuitBreakerOpen {
                estimated_recovery, ..
            } => Some(estimated_recovery.as_secs().max(1)),
            _ => None,
        }
    }
}
