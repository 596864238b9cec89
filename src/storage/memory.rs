use super::{CounterOutcome, CounterStore, WindowOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Window {
    /// (score_ms, member)
    entries: Vec<(i64, String)>,
}

impl Window {
    fn prune(&mut self, window: Duration, now_ms: i64) {
        let cutoff = now_ms - window.as_millis() as i64;
        self.entries.retain(|(score, _)| *score > cutoff);
    }
}

#[derive(Debug)]
struct Counter {
    value: u64,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Tables {
    windows: HashMap<String, Window>,
    counters: HashMap<String, Counter>,
}

/// Counter store kept in process memory.
///
/// Same semantics as the Redis store, scoped to one process. Window keys
/// are pruned by score on access and dropped once empty. Counters expire
/// by wall time; expired counters are evicted whenever a new counter key
/// is created, so per-minute keys do not accumulate.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn key_counts(&self) -> (usize, usize) {
        let tables = self.tables.lock();
        (tables.windows.len(), tables.counters.len())
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn window_check_and_insert(
        &self,
        key: &str,
        member: &str,
        limit: u64,
        window: Duration,
        now_ms: i64,
        _ttl: Duration,
    ) -> Result<WindowOutcome> {
        let mut tables = self.tables.lock();
        let entry = tables.windows.entry(key.to_string()).or_default();
        entry.prune(window, now_ms);

        let count = entry.entries.len() as u64;
        if count >= limit {
            return Ok(WindowOutcome {
                allowed: false,
                count,
            });
        }

        match entry.entries.iter_mut().find(|(_, m)| m == member) {
            Some(existing) => existing.0 = now_ms,
            None => entry.entries.push((now_ms, member.to_string())),
        }

        Ok(WindowOutcome {
            allowed: true,
            count: entry.entries.len() as u64,
        })
    }

    async fn window_count(&self, key: &str, window: Duration, now_ms: i64) -> Result<u64> {
        let mut tables = self.tables.lock();
        let Some(entry) = tables.windows.get_mut(key) else {
            return Ok(0);
        };
        entry.prune(window, now_ms);
        let count = entry.entries.len() as u64;
        if count == 0 {
            tables.windows.remove(key);
        }
        Ok(count)
    }

    async fn window_remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut tables = self.tables.lock();
        let Some(entry) = tables.windows.get_mut(key) else {
            return Ok(false);
        };
        let before = entry.entries.len();
        entry.entries.retain(|(_, m)| m != member);
        let removed = entry.entries.len() != before;
        if entry.entries.is_empty() {
            tables.windows.remove(key);
        }
        Ok(removed)
    }

    async fn counter_add_bounded(
        &self,
        key: &str,
        amount: u64,
        limit: u64,
        ttl: Duration,
    ) -> Result<CounterOutcome> {
        let now = Instant::now();
        let mut tables = self.tables.lock();
        if !tables.counters.contains_key(key) {
            tables.counters.retain(|_, c| c.expires_at > now);
        }
        let counter = tables
            .counters
            .entry(key.to_string())
            .or_insert_with(|| Counter {
                value: 0,
                expires_at: now + ttl,
            });
        if counter.expires_at <= now {
            counter.value = 0;
            counter.expires_at = now + ttl;
        }

        let total = counter.value.saturating_add(amount);
        if total > limit {
            return Ok(CounterOutcome {
                allowed: false,
                total: counter.value,
            });
        }
        counter.value = total;
        Ok(CounterOutcome {
            allowed: true,
            total,
        })
    }

    async fn counter_get(&self, key: &str) -> Result<u64> {
        let tables = self.tables.lock();
        Ok(tables
            .counters
            .get(key)
            .filter(|c| c.expires_at > Instant::now())
            .map_or(0, |c| c.value))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut tables = self.tables.lock();
        let before = tables.windows.len() + tables.counters.len();
        tables.windows.retain(|key, _| !key.starts_with(prefix));
        tables.counters.retain(|key, _| !key.starts_with(prefix));
        Ok((before - tables.windows.len() - tables.counters.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
