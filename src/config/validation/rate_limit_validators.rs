//! Rate limiting validators

use super::trait_def::Validate;
use crate::config::models::*;
use tracing::debug;

/// Safety margins must leave at least half of every limit usable
pub fn validate_safety_margin(margin: f64) -> Result<(), String> {
    if !margin.is_finite() || !(0.0..0.5).contains(&margin) {
        return Err(format!(
            "Safety margin must be in [0, 0.5), got {}",
            margin
        ));
    }
    Ok(())
}

impl Validate for RateLimitConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating rate limit configuration");

        validate_safety_margin(self.safety_margin)?;

        if self.key_prefix.is_empty() {
            return Err("Key prefix cannot be empty".to_string());
        }
        if self.key_prefix.contains(':') {
            return Err("Key prefix cannot contain ':'".to_string());
        }

        self.backpressure.validate()?;
        self.circuit_breaker.validate()?;

        for (id, definition) in &self.buckets {
            validate_bucket_id(id)?;
            definition
                .validate()
                .map_err(|e| format!("Bucket '{}': {}", id, e))?;

            let bucket = BucketConfig::from_definition(id, definition, self.safety_margin)?;
            if bucket.effective_rpm() == 0 {
                return Err(format!(
                    "Bucket '{}': effective rpm limit is zero after a {} safety margin",
                    id, bucket.safety_margin
                ));
            }
            if bucket.effective_rpd() == 0 {
                return Err(format!(
                    "Bucket '{}': effective rpd limit is zero after a {} safety margin",
                    id, bucket.safety_margin
                ));
            }
            if bucket.effective_tpm() == Some(0) {
                return Err(format!(
                    "Bucket '{}': effective tpm limit is zero after a {} safety margin",
                    id, bucket.safety_margin
                ));
            }
        }

        Ok(())
    }
}

fn validate_bucket_id(id: &str) -> Result<(), String> {
    if id.trim().is_empty() {
        return Err("Bucket id cannot be empty".to_string());
    }
    // ':' separates key segments in the shared store
    if id.contains(':') {
        return Err(format!("Bucket id '{}' cannot contain ':'", id));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(format!("Bucket id '{}' cannot contain whitespace", id));
    }
    Ok(())
}

impl Validate for BucketDefinition {
    fn validate(&self) -> Result<(), String> {
        if self.rpm == 0 {
            return Err("rpm must be greater than 0".to_string());
        }
        if self.rpd == 0 {
            return Err("rpd must be greater than 0".to_string());
        }
        if self.tpm == Some(0) {
            return Err("tpm must be greater than 0 when set".to_string());
        }
        if let Some(margin) = self.safety_margin {
            validate_safety_margin(margin)?;
        }
        if matches!(&self.model, Some(model) if model.trim().is_empty()) {
            return Err("model cannot be empty when set".to_string());
        }
        Ok(())
    }
}

impl Validate for BackpressureConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("Backpressure max_attempts must be at least 1".to_string());
        }
        if !self.max_wait_secs.is_finite() || self.max_wait_secs < 0.0 {
            return Err("Backpressure max_wait_secs must be a non-negative number".to_string());
        }
        if !self.jitter_secs.is_finite() || self.jitter_secs < 0.0 {
            return Err("Backpressure jitter_secs must be a non-negative number".to_string());
        }
        Ok(())
    }
}

impl Validate for CircuitBreakerSettings {
    fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("Circuit breaker failure_threshold must be at least 1".to_string());
        }
        if self.success_threshold == 0 {
            return Err("Circuit breaker success_threshold must be at least 1".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("Circuit breaker timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}
