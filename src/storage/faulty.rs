//! Counter store wrapper that injects failures and delays in tests

use super::{CounterOutcome, CounterStore, MemoryStore, WindowOutcome};
use crate::utils::error::{QuotaError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;

/// Store primitive that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Fault {
    /// `window_check_and_insert` on an RPM key
    RpmInsert,
    /// `window_check_and_insert` on an RPD key
    RpdInsert,
    /// `counter_add_bounded`
    Counter,
    /// `window_remove`
    Remove,
}

/// [`MemoryStore`] whose primitives fail or stall on demand
#[derive(Debug, Default)]
pub(crate) struct FaultyStore {
    inner: MemoryStore,
    failing: Mutex<HashSet<Fault>>,
    counter_delay: Mutex<Option<Duration>>,
}

impl FaultyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail(&self, fault: Fault) {
        self.failing.lock().insert(fault);
    }

    pub(crate) fn heal(&self, fault: Fault) {
        self.failing.lock().remove(&fault);
    }

    /// Stall every `counter_add_bounded` call for `delay` before it runs
    pub(crate) fn delay_counter(&self, delay: Duration) {
        *self.counter_delay.lock() = Some(delay);
    }

    fn check(&self, fault: Fault, key: &str) -> Result<()> {
        if self.failing.lock().contains(&fault) {
            return Err(QuotaError::backend(format!("injected {:?} failure on {}", fault, key)));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for FaultyStore {
    async fn window_check_and_insert(
        &self,
        key: &str,
        member: &str,
        limit: u64,
        window: Duration,
        now_ms: i64,
        ttl: Duration,
    ) -> Result<WindowOutcome> {
        let fault = if key.ends_with(":rpd") {
            Fault::RpdInsert
        } else {
            Fault::RpmInsert
        };
        self.check(fault, key)?;
        self.inner
            .window_check_and_insert(key, member, limit, window, now_ms, ttl)
            .await
    }

    async fn window_count(&self, key: &str, window: Duration, now_ms: i64) -> Result<u64> {
        self.inner.window_count(key, window, now_ms).await
    }

    async fn window_remove(&self, key: &str, member: &str) -> Result<bool> {
        self.check(Fault::Remove, key)?;
        self.inner.window_remove(key, member).await
    }

    async fn counter_add_bounded(
        &self,
        key: &str,
        amount: u64,
        limit: u64,
        ttl: Duration,
    ) -> Result<CounterOutcome> {
        let delay = *self.counter_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check(Fault::Counter, key)?;
        self.inner.counter_add_bounded(key, amount, limit, ttl).await
    }

    async fn counter_get(&self, key: &str) -> Result<u64> {
        self.inner.counter_get(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        self.inner.delete_prefix(prefix).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    fn backend_name(&self) -> &'static str {
        "faulty-memory"
    }
}
