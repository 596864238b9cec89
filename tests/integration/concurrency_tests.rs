//! Contention on a single bucket

use crate::common::TestLimiter;
use futures::future::join_all;
use quota_guard::{CheckOptions, HealthStatus};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checks_never_overshoot() {
    let t = TestLimiter::new();
    let tasks = (0..50).map(|_| {
        let limiter = t.limiter.clone();
        tokio::spawn(async move {
            limiter
                .check_and_consume("coordinators.anthropic", &CheckOptions::new())
                .await
        })
    });

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let allowed = results.iter().filter(|r| r.allowed).count();
    assert_eq!(allowed, 8);
    for result in &results {
        assert_eq!(result.allowed, result.token_identifier.is_some());
    }

    let metadata = t
        .limiter
        .bucket_metadata("coordinators.anthropic")
        .await
        .unwrap();
    assert_eq!(metadata.rpm_used, 8);
    assert_eq!(metadata.rpd_used, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tpm_never_overshoots() {
    let t = TestLimiter::new();
    let tasks = (0..20).map(|_| {
        let limiter = t.limiter.clone();
        tokio::spawn(async move {
            limiter
                .check_and_consume("subagents.researcher", &CheckOptions::new().with_tokens(1_000))
                .await
        })
    });

    let allowed = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .filter(|r| r.allowed)
        .count();
    assert_eq!(allowed, 8);

    let metadata = t
        .limiter
        .bucket_metadata("subagents.researcher")
        .await
        .unwrap();
    assert_eq!(metadata.tpm_used, Some(8_000));
    assert_eq!(metadata.rpm_used, 8);
}

#[tokio::test]
async fn test_usage_stats_and_health_after_traffic() {
    let t = TestLimiter::new();
    for _ in 0..3 {
        t.limiter
            .check_and_consume("coordinators.anthropic", &CheckOptions::new())
            .await
            .unwrap();
    }
    t.limiter
        .check_and_consume("internal.summarizer", &CheckOptions::new())
        .await
        .unwrap();

    let stats = t.limiter.get_usage_stats().await.unwrap();
    assert_eq!(stats.total_requests_this_minute, 4);
    assert_eq!(stats.total_requests_today, 4);
    assert_eq!(stats.uptime_percentage, 100.0);
    assert_eq!(stats.buckets["internal.summarizer"].rpd_remaining, 3);

    let health = t.limiter.health_check().await;
    assert_eq!(health.overall, HealthStatus::Healthy);
    assert_eq!(
        health.rate_limits["internal.summarizer"].rpd_utilization,
        25.0
    );
}
