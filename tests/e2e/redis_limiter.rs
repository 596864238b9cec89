//! Rate limiter against a live Redis

use quota_guard::config::{RedisConfig, StorageBackend, StorageConfig};
use quota_guard::{BucketDefinition, CheckOptions, Config, LimitKind, RateLimitConfig, RateLimiter};

fn live_config() -> Option<Config> {
    let url = std::env::var("REDIS_URL").ok()?;
    let mut rate_limit = RateLimitConfig::default()
        .with_safety_margin(0.2)
        .with_bucket("coordinators.openai", BucketDefinition::new(10, 1000).with_tpm(1000));
    rate_limit.key_prefix = format!("quota_guard_e2e_{}", uuid::Uuid::new_v4().simple());
    rate_limit.backpressure.enabled = false;

    Some(Config {
        storage: StorageConfig {
            backend: StorageBackend::Redis,
            redis: RedisConfig {
                url,
                connection_timeout: 5,
            },
        },
        rate_limit,
    })
}

#[tokio::test]
#[ignore = "requires a running Redis at REDIS_URL"]
async fn test_redis_enforces_effective_limit() {
    let Some(config) = live_config() else {
        return;
    };
    let limiter = RateLimiter::connect(&config).await.unwrap();
    let opts = CheckOptions::new();

    for _ in 0..8 {
        assert!(limiter
            .check_and_consume("coordinators.openai", &opts)
            .await
            .unwrap()
            .allowed);
    }
    let ninth = limiter
        .check_and_consume("coordinators.openai", &opts)
        .await
        .unwrap();
    assert_eq!(ninth.blocked_by, Some(LimitKind::Rpm));

    limiter.reset_limits(None).await.unwrap();
    let metadata = limiter.bucket_metadata("coordinators.openai").await.unwrap();
    assert_eq!(metadata.rpm_used, 0);
}

#[tokio::test]
#[ignore = "requires a running Redis at REDIS_URL"]
async fn test_redis_release_and_tpm_rollback() {
    let Some(config) = live_config() else {
        return;
    };
    let limiter = RateLimiter::connect(&config).await.unwrap();

    let allowed = limiter
        .check_and_consume("coordinators.openai", &CheckOptions::new().with_tokens(700))
        .await
        .unwrap();
    let denied = limiter
        .check_and_consume("coordinators.openai", &CheckOptions::new().with_tokens(700))
        .await
        .unwrap();
    assert_eq!(denied.blocked_by, Some(LimitKind::Tpm));

    let metadata = limiter.bucket_metadata("coordinators.openai").await.unwrap();
    assert_eq!(metadata.rpm_used, 1);
    assert_eq!(metadata.tpm_used, Some(700));

    let id = allowed.token_identifier.unwrap();
    limiter.release_slot("coordinators.openai", &id).await.unwrap();
    limiter.release_slot("coordinators.openai", &id).await.unwrap();
    assert_eq!(
        limiter.bucket_metadata("coordinators.openai").await.unwrap().rpm_used,
        0
    );

    limiter.reset_limits(None).await.unwrap();
    assert!(limiter.health_check().await.backend_reachable);
}
