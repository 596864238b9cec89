//! Circuit breaker implementation for fault tolerance

use super::types::{CircuitBreakerConfig, CircuitBreakerStatus, CircuitState};
use crate::utils::error::{CallError, QuotaError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Three-state circuit breaker guarding one bucket.
///
/// Every transition happens under a single lock, so at most one half-open
/// probe is in flight at a time.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    next_attempt: Option<Instant>,
    probe_in_flight: bool,
}

impl BreakerInner {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            next_attempt: None,
            probe_in_flight: false,
        }
    }
}

/// Admission granted by [`CircuitBreaker::try_acquire`].
///
/// Record the outcome with `record_success` or `record_failure`. A permit
/// dropped without an outcome (cancelled caller) counts as neither, but
/// frees the half-open probe slot.
#[must_use = "record the call outcome on the permit"]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    recorded: bool,
}

impl BreakerPermit<'_> {
    /// Whether this permit is the half-open probe
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record_success(mut self) {
        self.recorded = true;
        self.breaker.on_success(self.probe);
    }

    pub fn record_failure(mut self) {
        self.recorded = true;
        self.breaker.on_failure(self.probe);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.recorded && self.probe {
            self.breaker.release_probe();
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::closed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Ask to let one call through.
    ///
    /// An open circuit whose timeout has elapsed moves to half-open here and
    /// hands out the probe permit.
    pub fn try_acquire(&self) -> Result<BreakerPermit<'_>> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let probe = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let next_attempt = inner.next_attempt.unwrap_or(now);
                if now < next_attempt {
                    return Err(QuotaError::circuit_open(
                        &self.name,
                        inner.failure_count,
                        next_attempt - now,
                    ));
                }
                debug!(
                    "Circuit breaker {} transitioning from Open to HalfOpen",
                    self.name
                );
                inner.state = CircuitState::HalfOpen;
                inner.success_count = 0;
                inner.probe_in_flight = true;
                true
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    return Err(QuotaError::circuit_open(
                        &self.name,
                        inner.failure_count,
                        Duration::ZERO,
                    ));
                }
                inner.probe_in_flight = true;
                true
            }
        };

        Ok(BreakerPermit {
            breaker: self,
            probe,
            recorded: false,
        })
    }

    /// Execute a future with circuit breaker protection
    pub async fn call<F, R, E>(&self, f: F) -> std::result::Result<R, CallError<E>>
    where
        F: Future<Output = std::result::Result<R, E>>,
    {
        let permit = self.try_acquire()?;

        match f.await {
            Ok(result) => {
                permit.record_success();
                Ok(result)
            }
            Err(error) => {
                permit.record_failure();
                Err(CallError::Failed(error))
            }
        }
    }

    fn on_success(&self, probe: bool) {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen if probe => {
                inner.probe_in_flight = false;
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    info!(
                        "Circuit breaker {} closing after {} successful probes",
                        self.name, inner.success_count
                    );
                    let last_failure_time = inner.last_failure_time;
                    *inner = BreakerInner {
                        last_failure_time,
                        ..BreakerInner::closed()
                    };
                }
            }
            // Late completion of a call admitted before the last transition
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn on_failure(&self, probe: bool) {
        let mut inner = self.inner.lock();
        inner.last_failure_time = Some(Utc::now());
        inner.failure_count = inner.failure_count.saturating_add(1);

        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    warn!(
                        "Circuit breaker {} opening after {} consecutive failures",
                        self.name, inner.failure_count
                    );
                    self.open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                if probe {
                    debug!(
                        "Circuit breaker {} transitioning from HalfOpen to Open due to failed probe",
                        self.name
                    );
                } else {
                    debug!(
                        "Circuit breaker {} reopening due to late failure",
                        self.name
                    );
                }
                self.open(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    fn release_probe(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.success_count = 0;
        inner.probe_in_flight = false;
        inner.next_attempt = Some(Instant::now() + self.config.timeout);
    }

    /// Get current circuit breaker state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Snapshot of the breaker for reporting
    pub fn status(&self) -> CircuitBreakerStatus {
        let inner = self.inner.lock();
        let next_attempt_time = match (inner.state, inner.next_attempt) {
            (CircuitState::Open, Some(next_attempt)) => {
                let remaining = next_attempt.saturating_duration_since(Instant::now());
                chrono::Duration::from_std(remaining)
                    .ok()
                    .map(|remaining| Utc::now() + remaining)
            }
            _ => None,
        };

        CircuitBreakerStatus {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_time: inner.last_failure_time,
            next_attempt_time,
        }
    }

    /// Reset the circuit breaker
    pub fn reset(&self) {
        *self.inner.lock() = BreakerInner::closed();
        debug!("Circuit breaker {} reset", self.name);
    }
}
