//! Rate limiter facade
//!
//! Composes the window counters, token counter, backpressure controller,
//! and per-bucket circuit breakers behind one explicitly constructed service.

use super::backpressure::BackpressureController;
use super::clock::{Clock, SystemClock};
use super::tokens::TokenCounter;
use super::types::{CheckOptions, LimitKind, RateLimitMetadata, RateLimitResult};
use super::window::{self, WindowCounter};
use crate::config::{BucketConfig, BucketRegistry, Config, RateLimitConfig};
use crate::storage::{self, CounterStore};
use crate::utils::error::{CallError, CircuitBreaker, CircuitBreakerConfig, QuotaError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bucket-based distributed rate limiter with circuit breaker protection
pub struct RateLimiter {
    pub(super) registry: BucketRegistry,
    pub(super) store: Arc<dyn CounterStore>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) windows: WindowCounter,
    pub(super) tokens: TokenCounter,
    pub(super) backpressure: BackpressureController,
    pub(super) breaker_config: CircuitBreakerConfig,
    pub(super) breakers: DashMap<String, Arc<CircuitBreaker>>,
    pub(super) key_prefix: String,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("backend", &self.store.backend_name())
            .field("key_prefix", &self.key_prefix)
            .field("buckets", &self.registry.bucket_ids())
            .field("breakers", &self.breakers.len())
            .finish()
    }
}

impl RateLimiter {
    /// Create a rate limiter over an existing store.
    ///
    /// The key prefix, backpressure, and breaker settings are fixed here;
    /// bucket definitions can be replaced later with [`RateLimiter::reload`].
    pub fn new(
        config: &RateLimitConfig,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let registry = BucketRegistry::from_config(config)?;
        info!(
            "Rate limiter initialized with {} buckets on {} store",
            registry.bucket_ids().len(),
            store.backend_name()
        );

        Ok(Self {
            windows: WindowCounter::new(store.clone(), config.key_prefix.clone()),
            tokens: TokenCounter::new(store.clone(), config.key_prefix.clone()),
            backpressure: BackpressureController::new(config.backpressure.clone()),
            breaker_config: CircuitBreakerConfig::from(&config.circuit_breaker),
            breakers: DashMap::new(),
            key_prefix: config.key_prefix.clone(),
            registry,
            store,
            clock,
        })
    }

    /// Validate the configuration, connect to the configured store, and
    /// build a limiter on the system clock
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = storage::connect(config.storage()).await?;
        Self::new(config.rate_limit(), store, Arc::new(SystemClock))
    }

    /// Replace the bucket definitions; invalid configurations are rejected
    /// and leave the current buckets in place
    pub fn reload(&self, config: &RateLimitConfig) -> Result<()> {
        self.registry.reload(config)
    }

    pub fn registry(&self) -> &BucketRegistry {
        &self.registry
    }

    /// Circuit breaker for a bucket, created on first use
    pub fn breaker(&self, bucket: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(bucket) {
            return breaker.value().clone();
        }
        self.breakers
            .entry(bucket.to_string())
            .or_insert_with(|| {
                debug!("Creating circuit breaker for bucket {}", bucket);
                Arc::new(CircuitBreaker::new(bucket, self.breaker_config.clone()))
            })
            .value()
            .clone()
    }

    /// Reserve one request slot (and the estimated tokens, when the bucket
    /// has a TPM limit) in a single pass without retrying.
    ///
    /// A denied check leaves every counter as it was. An allowed result
    /// carries the `token_identifier` that [`RateLimiter::release_slot`]
    /// accepts. A deadline that has already passed is rejected with
    /// `DeadlineExceeded` before anything is reserved. If `opts.deadline`
    /// passes mid-check the reservation is released and `DeadlineExceeded`
    /// is returned.
    pub async fn check_and_consume(&self, bucket: &str, opts: &CheckOptions) -> Result<RateLimitResult> {
        let Some(deadline) = opts.deadline else {
            let id = Uuid::new_v4().to_string();
            return self.reserve(bucket, opts.token_count, &id).await;
        };
        if deadline <= Instant::now() {
            return Err(QuotaError::deadline(format!(
                "deadline passed before checking bucket {}",
                bucket
            )));
        }

        let id = Uuid::new_v4().to_string();

        match tokio::time::timeout_at(deadline, self.reserve(bucket, opts.token_count, &id)).await {
            Ok(result) => result,
            Err(_) => {
                self.release_quietly(bucket, &id).await;
                Err(QuotaError::deadline(format!(
                    "deadline passed while checking bucket {}",
                    bucket
                )))
            }
        }
    }

    /// [`RateLimiter::check_and_consume`] under the backpressure policy:
    /// retryable denials wait `min(retry_after, max_wait) + jitter` and try
    /// again; RPD exhaustion, a disabled policy, or the attempt ceiling
    /// surface the last denial as `RateLimitExceeded`.
    pub async fn await_slot(&self, bucket: &str, opts: &CheckOptions) -> Result<RateLimitResult> {
        self.backpressure
            .await_slot(bucket, opts.deadline, || self.check_and_consume(bucket, opts))
            .await
    }

    /// Reserve a slot, then run `call` behind the bucket's circuit breaker.
    ///
    /// The slot stays consumed once `call` has started. It is released when
    /// the breaker refuses the call or the deadline passes before `call`
    /// starts. A deadline that passes while `call`
    /// runs cancels it and counts as a breaker failure.
    pub async fn execute_with_protection<F, Fut, T, E>(
        &self,
        bucket: &str,
        opts: &CheckOptions,
        call: F,
    ) -> std::result::Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let slot = self.await_slot(bucket, opts).await?;
        let token_id = slot.token_identifier.unwrap_or_default();

        if opts.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            self.release_quietly(bucket, &token_id).await;
            return Err(QuotaError::deadline(format!(
                "deadline passed before the protected call on bucket {} started",
                bucket
            ))
            .into());
        }

        let breaker = self.breaker(bucket);
        let permit = match breaker.try_acquire() {
            Ok(permit) => permit,
            Err(e) => {
                self.release_quietly(bucket, &token_id).await;
                return Err(e.into());
            }
        };

        let outcome = match opts.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, call()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    permit.record_failure();
                    return Err(QuotaError::deadline(format!(
                        "protected call on bucket {} did not finish before its deadline",
                        bucket
                    ))
                    .into());
                }
            },
            None => call().await,
        };

        match outcome {
            Ok(value) => {
                permit.record_success();
                Ok(value)
            }
            Err(e) => {
                permit.record_failure();
                Err(CallError::Failed(e))
            }
        }
    }

    /// Give back a reservation whose call never reached the provider.
    ///
    /// Removes the identifier from the bucket's RPM and RPD windows.
    /// Releasing twice, an unknown identifier, or an empty one is a no-op.
    /// Tokens counted against TPM are not returned.
    pub async fn release_slot(&self, bucket: &str, token_identifier: &str) -> Result<()> {
        if token_identifier.is_empty() {
            return Ok(());
        }

        let rpm = self.windows.release(bucket, LimitKind::Rpm, token_identifier).await?;
        let rpd = self.windows.release(bucket, LimitKind::Rpd, token_identifier).await?;
        if rpm || rpd {
            debug!("Released slot {} on bucket {}", token_identifier, bucket);
        }
        Ok(())
    }

    /// Usage snapshot of one bucket without consuming anything
    pub async fn bucket_metadata(&self, bucket: &str) -> Result<RateLimitMetadata> {
        let config = self.registry.resolve(bucket)?;
        let now = self.clock.now();
        let rpm_used = self.windows.count(bucket, LimitKind::Rpm, now).await?;
        let rpd_used = self.windows.count(bucket, LimitKind::Rpd, now).await?;
        let tpm_used = self.tpm_used(&config, now).await?;
        Ok(build_metadata(&config, now, rpm_used, rpd_used, tpm_used))
    }

    /// Clear stored counters for one bucket, or every bucket under this
    /// limiter's key prefix, and reset the matching circuit breakers
    pub async fn reset_limits(&self, bucket: Option<&str>) -> Result<()> {
        let deleted = match bucket {
            Some(bucket) => {
                let deleted = self
                    .store
                    .delete_prefix(&format!("{}:{}:", self.key_prefix, bucket))
                    .await?;
                if let Some(breaker) = self.breakers.get(bucket) {
                    breaker.reset();
                }
                deleted
            }
            None => {
                let deleted = self
                    .store
                    .delete_prefix(&format!("{}:", self.key_prefix))
                    .await?;
                for breaker in self.breakers.iter() {
                    breaker.reset();
                }
                deleted
            }
        };

        info!(
            "Reset rate limits for {} ({} keys deleted)",
            bucket.unwrap_or("all buckets"),
            deleted
        );
        Ok(())
    }

    async fn reserve(&self, bucket: &str, token_count: Option<u64>, id: &str) -> Result<RateLimitResult> {
        let config = self.registry.resolve(bucket)?;
        let now = self.clock.now();

        let rpm = self
            .windows
            .check_and_increment(bucket, LimitKind::Rpm, config.effective_rpm(), id, now)
            .await?;
        if !rpm.allowed {
            let rpd_used = self.windows.count(bucket, LimitKind::Rpd, now).await?;
            let tpm_used = self.tpm_used(&config, now).await?;
            return Ok(denial(&config, now, LimitKind::Rpm, rpm.count, rpd_used, tpm_used));
        }

        let rpd = match self
            .windows
            .check_and_increment(bucket, LimitKind::Rpd, config.effective_rpd(), id, now)
            .await
        {
            Ok(rpd) => rpd,
            Err(e) => {
                self.release_quietly(bucket, id).await;
                return Err(e);
            }
        };
        if !rpd.allowed {
            if let Err(e) = self.windows.release(bucket, LimitKind::Rpm, id).await {
                warn!("Failed to roll back RPM slot {} on bucket {}: {}", id, bucket, e);
            }
            let tpm_used = self.tpm_used(&config, now).await?;
            return Ok(denial(
                &config,
                now,
                LimitKind::Rpd,
                rpm.count.saturating_sub(1),
                rpd.count,
                tpm_used,
            ));
        }

        let tpm_used = match (config.effective_tpm(), token_count) {
            (Some(limit), Some(tokens)) => {
                let outcome = match self.tokens.check_and_increment(bucket, tokens, limit, now).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        self.release_quietly(bucket, id).await;
                        return Err(e);
                    }
                };
                if !outcome.allowed {
                    self.release_quietly(bucket, id).await;
                    return Ok(denial(
                        &config,
                        now,
                        LimitKind::Tpm,
                        rpm.count.saturating_sub(1),
                        rpd.count.saturating_sub(1),
                        Some(outcome.total),
                    ));
                }
                Some(outcome.total)
            }
            _ => self.tpm_used(&config, now).await?,
        };

        let metadata = build_metadata(&config, now, rpm.count, rpd.count, tpm_used);
        Ok(RateLimitResult::allowed(metadata, id.to_string()))
    }

    async fn tpm_used(&self, config: &BucketConfig, now: DateTime<Utc>) -> Result<Option<u64>> {
        match config.effective_tpm() {
            Some(_) => Ok(Some(self.tokens.used(&config.id, now).await?)),
            None => Ok(None),
        }
    }

    async fn release_quietly(&self, bucket: &str, id: &str) {
        if let Err(e) = self.release_slot(bucket, id).await {
            warn!("Failed to release slot {} on bucket {}: {}", id, bucket, e);
        }
    }
}

fn denial(
    config: &BucketConfig,
    now: DateTime<Utc>,
    blocked_by: LimitKind,
    rpm_used: u64,
    rpd_used: u64,
    tpm_used: Option<u64>,
) -> RateLimitResult {
    let retry_after = window::retry_after(blocked_by, now);
    debug!(
        "Bucket {} denied by {} (retry after {}s)",
        config.id, blocked_by, retry_after
    );
    let metadata = build_metadata(config, now, rpm_used, rpd_used, tpm_used);
    RateLimitResult::denied(metadata, blocked_by, retry_after)
}

pub(super) fn build_metadata(
    config: &BucketConfig,
    now: DateTime<Utc>,
    rpm_used: u64,
    rpd_used: u64,
    tpm_used: Option<u64>,
) -> RateLimitMetadata {
    let rpm_limit = config.effective_rpm();
    let rpd_limit = config.effective_rpd();
    let tpm_limit = config.effective_tpm();
    let tpm_used = tpm_limit.map(|_| tpm_used.unwrap_or(0));

    RateLimitMetadata {
        bucket: config.id.clone(),
        model: config.model.clone(),
        provider: config.provider.clone(),
        rpm_limit,
        rpm_used,
        rpm_remaining: rpm_limit.saturating_sub(rpm_used),
        rpd_limit,
        rpd_used,
        rpd_remaining: rpd_limit.saturating_sub(rpd_used),
        tpm_limit,
        tpm_used,
        tpm_remaining: tpm_limit.zip(tpm_used).map(|(limit, used)| limit.saturating_sub(used)),
        reset_time_rpm: window::next_minute(now),
        reset_time_rpd: window::next_midnight(now),
        reset_time_tpm: tpm_limit.map(|_| window::next_minute(now)),
        safety_margin: config.safety_margin,
    }
}
