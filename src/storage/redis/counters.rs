//! `CounterStore` operations on Redis

use super::pool::RedisPool;
use crate::storage::{CounterOutcome, CounterStore, WindowOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

const SCAN_BATCH: usize = 500;

#[async_trait]
impl CounterStore for RedisPool {
    async fn window_check_and_insert(
        &self,
        key: &str,
        member: &str,
        limit: u64,
        window: Duration,
        now_ms: i64,
        ttl: Duration,
    ) -> Result<WindowOutcome> {
        let cutoff = now_ms - window.as_millis() as i64;
        let mut conn = self.conn();
        let (allowed, count): (i64, i64) = self
            .scripts
            .window_check_and_insert
            .key(key)
            .arg(member)
            .arg(limit)
            .arg(cutoff)
            .arg(now_ms)
            .arg(ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;

        Ok(WindowOutcome {
            allowed: allowed == 1,
            count: count.max(0) as u64,
        })
    }

    async fn window_count(&self, key: &str, window: Duration, now_ms: i64) -> Result<u64> {
        let cutoff = now_ms - window.as_millis() as i64;
        let mut conn = self.conn();
        let count: u64 = conn.zcount(key, format!("({}", cutoff), "+inf").await?;
        Ok(count)
    }

    async fn window_remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn();
        let removed: i64 = conn.zrem(key, member).await?;
        Ok(removed > 0)
    }

    async fn counter_add_bounded(
        &self,
        key: &str,
        amount: u64,
        limit: u64,
        ttl: Duration,
    ) -> Result<CounterOutcome> {
        let mut conn = self.conn();
        let (allowed, total): (i64, i64) = self
            .scripts
            .counter_add_bounded
            .key(key)
            .arg(amount)
            .arg(limit)
            .arg(ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;

        Ok(CounterOutcome {
            allowed: allowed == 1,
            total: total.max(0) as u64,
        })
    }

    async fn counter_get(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn();
        let value: Option<u64> = conn.get(key).await?;
        Ok(value.unwrap_or(0))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let removed: u64 = conn.del(&keys).await?;
                deleted += removed;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!("Deleted {} keys matching {}", deleted, pattern);
        Ok(deleted)
    }

    async fn ping(&self) -> Result<()> {
        self.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Escape glob metacharacters so a literal prefix can be used with MATCH
pub(crate) fn escape_glob(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
