//! Storage validators

use super::trait_def::Validate;
use crate::config::models::*;
use tracing::debug;

impl Validate for StorageConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating storage configuration");

        if self.backend == StorageBackend::Redis {
            self.redis.validate()?;
        }
        Ok(())
    }
}

impl Validate for RedisConfig {
    fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }

        let parsed =
            url::Url::parse(&self.url).map_err(|e| format!("Invalid Redis URL: {}", e))?;
        if !matches!(parsed.scheme(), "redis" | "rediss" | "redis+unix" | "unix") {
            return Err(format!(
                "Redis URL must use redis://, rediss:// or unix://, got {}://",
                parsed.scheme()
            ));
        }

        if self.connection_timeout == 0 {
            return Err("Redis connection timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}
