//! Protected calls: breaker, reservation, and deadline behavior

use crate::common::{TestLimiter, bucket_config};
use quota_guard::config::BackpressureConfig;
use quota_guard::{CallError, CheckOptions, CircuitState, LimitKind, QuotaError, RateLimitConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const BUCKET: &str = "coordinators.anthropic";

async fn fail(t: &TestLimiter) -> Result<(), CallError<String>> {
    t.limiter
        .execute_with_protection(BUCKET, &CheckOptions::new(), || async {
            Err("upstream 503".to_string())
        })
        .await
}

#[tokio::test]
async fn test_breaker_lifecycle_through_facade() {
    let t = TestLimiter::new();
    for _ in 0..3 {
        assert!(matches!(fail(&t).await, Err(CallError::Failed(_))));
    }

    let breaker = t.limiter.breaker(BUCKET);
    let status = breaker.status();
    assert_eq!(status.state, CircuitState::Open);
    assert_eq!(status.failure_count, 3);
    assert!(status.next_attempt_time.is_some());

    let invoked = AtomicU32::new(0);
    let result: Result<(), CallError<String>> = t
        .limiter
        .execute_with_protection(BUCKET, &CheckOptions::new(), || async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

    match result.unwrap_err() {
        CallError::Rejected(QuotaError::CircuitBreakerOpen {
            bucket,
            failure_count,
            estimated_recovery,
        }) => {
            assert_eq!(bucket, BUCKET);
            assert_eq!(failure_count, 3);
            assert!(estimated_recovery <= Duration::from_secs(5));
        }
        other => panic!("expected an open circuit, got {:?}", other),
    }
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_breaker_recovers_after_timeout() {
    let config = RateLimitConfig {
        circuit_breaker: quota_guard::config::CircuitBreakerSettings {
            failure_threshold: 1,
            success_threshold: 1,
            timeout_secs: 1,
        },
        ..bucket_config()
    };
    let t = TestLimiter::with_config(&config);
    assert!(fail(&t).await.is_err());
    assert_eq!(t.limiter.breaker(BUCKET).state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let value = t
        .limiter
        .execute_with_protection(BUCKET, &CheckOptions::new(), || async {
            Ok::<_, String>("probe ok")
        })
        .await
        .unwrap();
    assert_eq!(value, "probe ok");
    assert_eq!(t.limiter.breaker(BUCKET).state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_rate_limit_rejection_skips_call() {
    let t = TestLimiter::new();
    // rpd 5 with margin 0.2 leaves 4 per day
    for _ in 0..4 {
        t.limiter
            .check_and_consume("internal.summarizer", &CheckOptions::new())
            .await
            .unwrap();
    }

    let invoked = AtomicU32::new(0);
    let result: Result<(), CallError<String>> = t
        .limiter
        .execute_with_protection("internal.summarizer", &CheckOptions::new(), || async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

    let err = result.unwrap_err();
    let rejection = err.rejection().unwrap();
    assert!(rejection.is_rate_limited());
    assert!(matches!(
        rejection,
        QuotaError::RateLimitExceeded { blocked_by: LimitKind::Rpd, .. }
    ));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    // Denials are not breaker failures
    assert_eq!(t.limiter.breaker("internal.summarizer").status().failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_backpressure_waits_for_window() {
    let config = RateLimitConfig {
        backpressure: BackpressureConfig {
            enabled: true,
            max_attempts: 3,
            max_wait_secs: 60.0,
            jitter_secs: 0.0,
        },
        ..bucket_config()
    };
    let t = TestLimiter::with_config(&config);
    for _ in 0..8 {
        t.limiter.check_and_consume(BUCKET, &CheckOptions::new()).await.unwrap();
    }

    // The clock the counters read is manual; move it past the window while
    // the waiter sleeps.
    let clock = t.clock.clone();
    let waker = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        clock.advance(chrono::Duration::seconds(61));
    });

    let started = tokio::time::Instant::now();
    let result = t.limiter.await_slot(BUCKET, &CheckOptions::new()).await.unwrap();
    waker.await.unwrap();

    assert!(result.allowed);
    assert_eq!(started.elapsed(), Duration::from_secs(40));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_preempts_backpressure() {
    let config = RateLimitConfig {
        backpressure: BackpressureConfig {
            enabled: true,
            max_attempts: 10,
            max_wait_secs: 60.0,
            jitter_secs: 0.0,
        },
        ..bucket_config()
    };
    let t = TestLimiter::with_config(&config);
    for _ in 0..8 {
        t.limiter.check_and_consume(BUCKET, &CheckOptions::new()).await.unwrap();
    }

    let started = tokio::time::Instant::now();
    let opts = CheckOptions::new().with_timeout(Duration::from_secs(5));
    let err = t.limiter.await_slot(BUCKET, &opts).await.unwrap_err();

    assert!(err.is_rate_limited());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_release_after_unsent_call() {
    let t = TestLimiter::new();
    let result = t
        .limiter
        .check_and_consume(BUCKET, &CheckOptions::new())
        .await
        .unwrap();
    let id = result.token_identifier.clone().unwrap();
    assert_eq!(result.metadata.rpm_used, 1);
    assert_eq!(result.metadata.model.as_deref(), Some("claude-sonnet"));
    assert_eq!(result.metadata.provider, "anthropic");

    t.limiter.release_slot(BUCKET, &id).await.unwrap();
    t.limiter.release_slot(BUCKET, &id).await.unwrap();

    let metadata = t.limiter.bucket_metadata(BUCKET).await.unwrap();
    assert_eq!(metadata.rpm_used, 0);
    assert_eq!(metadata.rpd_used, 0);
}

#[tokio::test]
async fn test_tpm_budget_per_minute() {
    let t = TestLimiter::new();
    let bucket = "subagents.researcher";

    // tpm 10_000 with margin 0.2 leaves 8_000
    let first = t
        .limiter
        .check_and_consume(bucket, &CheckOptions::new().with_tokens(5_000))
        .await
        .unwrap();
    assert!(first.allowed);
    assert_eq!(first.metadata.tpm_remaining, Some(3_000));
    assert!(first.metadata.reset_time_tpm.is_some());

    let denied = t
        .limiter
        .check_and_consume(bucket, &CheckOptions::new().with_tokens(4_000))
        .await
        .unwrap();
    assert_eq!(denied.blocked_by, Some(LimitKind::Tpm));
    assert!(denied.token_identifier.is_none());

    let before = t.limiter.bucket_metadata(bucket).await.unwrap();
    assert_eq!(before.rpm_used, 1);

    t.clock.advance(chrono::Duration::seconds(40));
    let next_minute = t
        .limiter
        .check_and_consume(bucket, &CheckOptions::new().with_tokens(4_000))
        .await
        .unwrap();
    assert!(next_minute.allowed);
    assert_eq!(next_minute.metadata.tpm_used, Some(4_000));
}
