//! Redis connection management

use super::scripts::Scripts;
use crate::config::RedisConfig;
use crate::utils::error::{QuotaError, Result};
use redis::{Client, aio::MultiplexedConnection};
use std::time::Duration;
use tracing::{debug, info};

/// Multiplexed Redis connection plus the preloaded limiter scripts
#[derive(Clone)]
pub struct RedisPool {
    pub(crate) connection: MultiplexedConnection,
    pub(crate) scripts: Scripts,
    pub(crate) config: RedisConfig,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("url", &Self::sanitize_url(&self.config.url))
            .finish()
    }
}

impl RedisPool {
    /// Connect to Redis. Fails if the server is unreachable within the
    /// configured connection timeout.
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        info!("Connecting to Redis counter store");
        debug!("Redis URL: {}", Self::sanitize_url(&config.url));

        let client = Client::open(config.url.as_str())?;
        let timeout = Duration::from_secs(config.connection_timeout);

        let connection = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| {
                QuotaError::backend(format!(
                    "timed out connecting to {} after {}s",
                    Self::sanitize_url(&config.url),
                    config.connection_timeout
                ))
            })??;

        info!("Redis connection established");
        Ok(Self {
            connection,
            scripts: Scripts::load(),
            config: config.clone(),
        })
    }

    /// Connection handle for one operation
    pub(crate) fn conn(&self) -> MultiplexedConnection {
        self.connection.clone()
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        debug!("Performing Redis health check");
        let mut conn = self.conn();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!("Redis health check passed");
        Ok(())
    }

    /// Sanitize Redis URL for logging (hide password)
    pub(crate) fn sanitize_url(url: &str) -> String {
        if let Ok(parsed) = url::Url::parse(url) {
            let mut sanitized = parsed.clone();
            if sanitized.password().is_some() {
                let _ = sanitized.set_password(Some("***"));
            }
            sanitized.to_string()
        } else {
            "invalid_url".to_string()
        }
    }
}
