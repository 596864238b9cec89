//! Validated bucket table with hot reload

use super::models::{BucketConfig, RateLimitConfig};
use super::validation::Validate;
use crate::utils::error::{QuotaError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

type BucketTable = BTreeMap<String, BucketConfig>;

/// Resolves bucket ids to validated bucket configs.
///
/// Reloads validate the whole new table before swapping it in, so a bad
/// reload leaves the previous table in place.
#[derive(Debug)]
pub struct BucketRegistry {
    table: RwLock<Arc<BucketTable>>,
}

impl BucketRegistry {
    /// Build a registry from a rate limit configuration
    pub fn from_config(config: &RateLimitConfig) -> Result<Self> {
        Ok(Self {
            table: RwLock::new(Arc::new(build_table(config)?)),
        })
    }

    /// Resolve a bucket id; unknown ids are an error
    pub fn resolve(&self, bucket: &str) -> Result<BucketConfig> {
        self.table
            .read()
            .get(bucket)
            .cloned()
            .ok_or_else(|| QuotaError::unknown_bucket(bucket))
    }

    /// Configured bucket ids, sorted
    pub fn bucket_ids(&self) -> Vec<String> {
        self.table.read().keys().cloned().collect()
    }

    /// Swap in a new set of bucket definitions
    pub fn reload(&self, config: &RateLimitConfig) -> Result<()> {
        let table = build_table(config)?;
        let count = table.len();
        *self.table.write() = Arc::new(table);
        info!("Reloaded {} bucket definitions", count);
        Ok(())
    }
}

fn build_table(config: &RateLimitConfig) -> Result<BucketTable> {
    config
        .validate()
        .map_err(|e| QuotaError::Config(format!("Rate limit config error: {}", e)))?;

    config
        .buckets
        .iter()
        .map(|(id, definition)| {
            BucketConfig::from_definition(id, definition, config.safety_margin)
                .map(|bucket| (id.clone(), bucket))
                .map_err(QuotaError::Config)
        })
        .collect()
}
