//! Configuration management for the quota guard
//!
//! This module handles loading, validation, and hot reloading of bucket
//! definitions and the limiter's ambient settings.

pub mod models;
mod registry;
pub mod validation;

pub use models::*;
pub use registry::BucketRegistry;
pub use validation::Validate;

use crate::utils::error::{QuotaError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Shared counter store
    #[serde(default)]
    pub storage: StorageConfig,
    /// Buckets, safety margin, backpressure and breaker settings
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Load configuration from a YAML file, apply environment overrides and validate
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| QuotaError::Config(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_yaml_str(&content)?.apply_env()?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Parse configuration from YAML without validating it
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| QuotaError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(url) = env_var("QUOTA_GUARD_REDIS_URL").or_else(|| env_var("REDIS_URL")) {
            self.storage.redis.url = url;
        }
        if let Some(backend) = env_var("QUOTA_GUARD_BACKEND") {
            self.storage.backend = backend.parse().map_err(QuotaError::Config)?;
        }
        if let Some(margin) = env_var("QUOTA_GUARD_SAFETY_MARGIN") {
            self.rate_limit.safety_margin = margin
                .parse()
                .map_err(|e| QuotaError::Config(format!("Invalid safety margin: {}", e)))?;
        }
        if let Some(prefix) = env_var("QUOTA_GUARD_KEY_PREFIX") {
            self.rate_limit.key_prefix = prefix;
        }
        Ok(self)
    }

    /// Get storage configuration
    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Get rate limit configuration
    pub fn rate_limit(&self) -> &RateLimitConfig {
        &self.rate_limit
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");

        self.storage
            .validate()
            .map_err(|e| QuotaError::Config(format!("Storage config error: {}", e)))?;

        self.rate_limit
            .validate()
            .map_err(|e| QuotaError::Config(format!("Rate limit config error: {}", e)))?;

        debug!("Configuration validation completed");
        Ok(())
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| QuotaError::Config(format!("Failed to serialize config to JSON: {}", e)))
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| QuotaError::Config(format!("Failed to serialize config to YAML: {}", e)))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
