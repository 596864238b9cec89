//! Bounded, jittered retry of denied checks

use super::types::{LimitKind, RateLimitResult};
use crate::config::BackpressureConfig;
use crate::utils::error::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Turns a retryable denial into a bounded wait-and-retry sequence
#[derive(Debug, Clone)]
pub struct BackpressureController {
    config: BackpressureConfig,
}

impl BackpressureController {
    pub fn new(config: BackpressureConfig) -> Self {
        Self { config }
    }

    /// How long to wait before the next attempt, or `None` to give up.
    ///
    /// `attempt` counts checks already made, the first one included.
    pub fn decide(&self, result: &RateLimitResult, attempt: u32) -> Option<Duration> {
        if result.allowed
            || !self.config.enabled
            || result.blocked_by == Some(LimitKind::Rpd)
            || attempt >= self.config.max_attempts
        {
            return None;
        }

        let retry_after = Duration::from_secs(result.retry_after.unwrap_or(1));
        Some(retry_after.min(self.config.max_wait()) + self.jitter())
    }

    fn jitter(&self) -> Duration {
        let jitter = self.config.jitter_secs;
        if jitter.is_nan() || jitter <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(rand::thread_rng().gen_range(0.0..jitter))
            .unwrap_or(Duration::ZERO)
    }

    /// Run `check` until it allows, the policy gives up, or the next wait
    /// would end past `deadline`. A final denial surfaces as
    /// `RateLimitExceeded`.
    pub async fn await_slot<F, Fut>(
        &self,
        bucket: &str,
        deadline: Option<Instant>,
        mut check: F,
    ) -> Result<RateLimitResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RateLimitResult>>,
    {
        let mut attempt = 0u32;
        loop {
            let result = check().await?;
            attempt += 1;
            if result.allowed {
                return Ok(result);
            }

            let Some(delay) = self.decide(&result, attempt) else {
                debug!(
                    "Giving up on bucket {} after {} attempt(s), blocked by {:?}",
                    bucket, attempt, result.blocked_by
                );
                return Err(result.into_error());
            };

            if deadline.is_some_and(|deadline| Instant::now() + delay >= deadline) {
                warn!(
                    "Deadline leaves no room to wait {:?} for bucket {}",
                    delay, bucket
                );
                return Err(result.into_error());
            }

            debug!(
                "Bucket {} blocked by {:?}, retrying in {:?} (attempt {}/{})",
                bucket, result.blocked_by, delay, attempt, self.config.max_attempts
            );
            tokio::time::sleep(delay).await;
        }
    }
}
