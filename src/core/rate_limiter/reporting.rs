//! Usage statistics and health reporting

use super::limiter::RateLimiter;
use super::types::{
    BucketUtilization, CircuitHealth, HealthReport, HealthStatus, UsageStats, uptime_percentage,
};
use crate::utils::error::{CircuitState, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::warn;

impl RateLimiter {
    /// Usage of every configured bucket plus the state of every circuit
    /// created so far
    pub async fn get_usage_stats(&self) -> Result<UsageStats> {
        let mut buckets = BTreeMap::new();
        for bucket in self.registry.bucket_ids() {
            let metadata = self.bucket_metadata(&bucket).await?;
            buckets.insert(bucket, metadata);
        }

        let circuits: BTreeMap<_, _> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().status()))
            .collect();

        Ok(UsageStats {
            total_requests_today: buckets.values().map(|m| m.rpd_used).sum(),
            total_requests_this_minute: buckets.values().map(|m| m.rpm_used).sum(),
            uptime_percentage: uptime_percentage(circuits.values().map(|s| &s.state)),
            buckets,
            circuits,
            last_updated: Utc::now(),
        })
    }

    /// Health of the shared store, circuits, and bucket utilization.
    ///
    /// Never fails: an unreachable store is reported as `Unhealthy`.
    pub async fn health_check(&self) -> HealthReport {
        let mut backend_reachable = match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Counter store health check failed: {}", e);
                false
            }
        };

        let circuits: BTreeMap<_, _> = self
            .breakers
            .iter()
            .map(|entry| {
                let state = entry.value().state();
                (
                    entry.key().clone(),
                    CircuitHealth {
                        state,
                        healthy: state == CircuitState::Closed,
                    },
                )
            })
            .collect();

        let mut rate_limits = BTreeMap::new();
        if backend_reachable {
            for bucket in self.registry.bucket_ids() {
                match self.bucket_metadata(&bucket).await {
                    Ok(metadata) => {
                        rate_limits.insert(
                            bucket,
                            BucketUtilization {
                                rpm_utilization: metadata.rpm_utilization(),
                                rpd_utilization: metadata.rpd_utilization(),
                            },
                        );
                    }
                    Err(e) => {
                        warn!("Failed to read usage for bucket {}: {}", bucket, e);
                        backend_reachable = false;
                        break;
                    }
                }
            }
        }

        let overall = if !backend_reachable {
            HealthStatus::Unhealthy
        } else if circuits.values().any(|c| !c.healthy) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport {
            overall,
            backend_reachable,
            circuits,
            rate_limits,
            timestamp: Utc::now(),
        }
    }
}
