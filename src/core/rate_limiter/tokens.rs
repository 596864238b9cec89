//! Tokens-per-minute counters

use super::window::MINUTE_SECS;
use crate::storage::{CounterOutcome, CounterStore};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Two minutes, so a counter outlives the minute it belongs to
const TPM_TTL: Duration = Duration::from_secs(120);

/// Per-minute token totals keyed `{prefix}:{bucket}:tpm:{epoch_minute}`
#[derive(Debug, Clone)]
pub(crate) struct TokenCounter {
    store: Arc<dyn CounterStore>,
    prefix: String,
}

impl TokenCounter {
    pub(crate) fn new(store: Arc<dyn CounterStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub(crate) fn key(&self, bucket: &str, now: DateTime<Utc>) -> String {
        format!(
            "{}:{}:tpm:{}",
            self.prefix,
            bucket,
            now.timestamp().div_euclid(MINUTE_SECS)
        )
    }

    /// Add `tokens` to this minute's total unless it would exceed `limit`.
    /// A denial leaves the total unchanged.
    pub(crate) async fn check_and_increment(
        &self,
        bucket: &str,
        tokens: u64,
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<CounterOutcome> {
        self.store
            .counter_add_bounded(&self.key(bucket, now), tokens, limit, TPM_TTL)
            .await
    }

    pub(crate) async fn used(&self, bucket: &str, now: DateTime<Utc>) -> Result<u64> {
        self.store.counter_get(&self.key(bucket, now)).await
    }
}
