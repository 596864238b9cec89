//! Sliding-window request counters

use super::types::LimitKind;
use crate::storage::{CounterStore, WindowOutcome};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const MINUTE_SECS: i64 = 60;
pub(crate) const DAY_SECS: i64 = 86_400;

/// Extra lifetime on window keys past their span
const TTL_SLACK: Duration = Duration::from_secs(60);

/// RPM and RPD windows for every bucket, stored as sorted sets keyed
/// `{prefix}:{bucket}:{rpm|rpd}`
#[derive(Debug, Clone)]
pub(crate) struct WindowCounter {
    store: Arc<dyn CounterStore>,
    prefix: String,
}

impl WindowCounter {
    pub(crate) fn new(store: Arc<dyn CounterStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub(crate) fn key(&self, bucket: &str, kind: LimitKind) -> String {
        format!("{}:{}:{}", self.prefix, bucket, kind)
    }

    /// Reserve `id` in the window unless it is full. A denial inserts nothing.
    pub(crate) async fn check_and_increment(
        &self,
        bucket: &str,
        kind: LimitKind,
        limit: u64,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<WindowOutcome> {
        let window = window_span(kind);
        self.store
            .window_check_and_insert(
                &self.key(bucket, kind),
                id,
                limit,
                window,
                now.timestamp_millis(),
                window + TTL_SLACK,
            )
            .await
    }

    pub(crate) async fn count(&self, bucket: &str, kind: LimitKind, now: DateTime<Utc>) -> Result<u64> {
        self.store
            .window_count(&self.key(bucket, kind), window_span(kind), now.timestamp_millis())
            .await
    }

    pub(crate) async fn release(&self, bucket: &str, kind: LimitKind, id: &str) -> Result<bool> {
        self.store.window_remove(&self.key(bucket, kind), id).await
    }
}

fn window_span(kind: LimitKind) -> Duration {
    match kind {
        LimitKind::Rpd => Duration::from_secs(DAY_SECS as u64),
        LimitKind::Rpm | LimitKind::Tpm => Duration::from_secs(MINUTE_SECS as u64),
    }
}

/// Start of the next calendar minute
pub(crate) fn next_minute(now: DateTime<Utc>) -> DateTime<Utc> {
    next_boundary(now, MINUTE_SECS)
}

/// Next UTC midnight
pub(crate) fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    next_boundary(now, DAY_SECS)
}

fn next_boundary(now: DateTime<Utc>, period: i64) -> DateTime<Utc> {
    let boundary = (now.timestamp().div_euclid(period) + 1) * period;
    DateTime::from_timestamp(boundary, 0).unwrap_or(now)
}

/// Whole seconds until the window blocking `kind` resets, at least one
pub(crate) fn retry_after(kind: LimitKind, now: DateTime<Utc>) -> u64 {
    let boundary = match kind {
        LimitKind::Rpd => next_midnight(now),
        LimitKind::Rpm | LimitKind::Tpm => next_minute(now),
    };
    (boundary.timestamp() - now.timestamp()).max(1) as u64
}
