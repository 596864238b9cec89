//! Counter storage for the quota guard
//!
//! Every quota dimension lives in a [`CounterStore`]. Each check-and-insert
//! is a single atomic step on the store, so concurrent callers in separate
//! processes never overshoot a limit.

/// In-process counter store
pub mod memory;
/// Redis counter store
pub mod redis;

#[cfg(test)]
pub(crate) mod faulty;

use crate::config::{StorageBackend, StorageConfig};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use memory::MemoryStore;
pub use self::redis::RedisPool;

/// Result of a sliding-window check-and-insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    /// Whether the member was inserted
    pub allowed: bool,
    /// Members in the window after the operation
    pub count: u64,
}

/// Result of a bounded counter increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterOutcome {
    /// Whether the amount was added
    pub allowed: bool,
    /// Counter value after the operation
    pub total: u64,
}

/// Shared counter primitives used by the rate limiter.
///
/// Window entries are scored in epoch milliseconds. An entry scored at or
/// before `now_ms - window` no longer counts.
#[async_trait]
pub trait CounterStore: Send + Sync + std::fmt::Debug {
    /// Prune expired entries, then insert `member` only if fewer than
    /// `limit` entries remain. The key expires after `ttl`.
    async fn window_check_and_insert(
        &self,
        key: &str,
        member: &str,
        limit: u64,
        window: Duration,
        now_ms: i64,
        ttl: Duration,
    ) -> Result<WindowOutcome>;

    /// Count live entries without inserting
    async fn window_count(&self, key: &str, window: Duration, now_ms: i64) -> Result<u64>;

    /// Remove a member; returns whether it was present
    async fn window_remove(&self, key: &str, member: &str) -> Result<bool>;

    /// Add `amount` only if the total stays within `limit`
    async fn counter_add_bounded(
        &self,
        key: &str,
        amount: u64,
        limit: u64,
        ttl: Duration,
    ) -> Result<CounterOutcome>;

    /// Current counter value, zero when absent
    async fn counter_get(&self, key: &str) -> Result<u64>;

    /// Delete every key starting with `prefix`; returns the number deleted
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()>;

    /// Short backend name for logs and reports
    fn backend_name(&self) -> &'static str;
}

/// Open the counter store selected by the configuration
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn CounterStore>> {
    match config.backend {
        StorageBackend::Redis => {
            let pool = RedisPool::new(&config.redis).await?;
            Ok(Arc::new(pool))
        }
        StorageBackend::Memory => {
            info!("Using in-memory counter store; counts are local to this process");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
