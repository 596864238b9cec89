//! Loading configuration files and hot reload

use quota_guard::config::StorageBackend;
use quota_guard::{BucketCategory, CheckOptions, Config, QuotaError, RateLimiter};
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
storage:
  backend: memory
rate_limit:
  safety_margin: 0.1
  buckets:
    coordinators.openai:
      rpm: 100
      rpd: 10000
      tpm: 90000
    internal.router:
      rpm: 30
      rpd: 1000
      safety_margin: 0.0
    batch-jobs:
      rpm: 5
      rpd: 50
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_connect_from_file() {
    let file = write_config(CONFIG);
    let config = Config::from_file(file.path()).await.unwrap();
    assert_eq!(config.storage().backend, StorageBackend::Memory);

    let limiter = RateLimiter::connect(&config).await.unwrap();
    let registry = limiter.registry();

    let openai = registry.resolve("coordinators.openai").unwrap();
    assert_eq!(openai.effective_rpm(), 90);
    assert_eq!(openai.effective_tpm(), Some(81_000));
    assert_eq!(
        openai.category,
        BucketCategory::Coordinator {
            provider: "openai".to_string()
        }
    );

    let router = registry.resolve("internal.router").unwrap();
    assert_eq!(router.effective_rpm(), 30);
    assert_eq!(router.provider, "unknown");

    assert_eq!(
        registry.resolve("batch-jobs").unwrap().category,
        BucketCategory::Standalone
    );
}

#[tokio::test]
async fn test_invalid_file_fails_fast() {
    let file = write_config(
        "rate_limit:\n  safety_margin: 0.7\n  buckets:\n    internal.router:\n      rpm: 1\n      rpd: 1\n",
    );
    let err = Config::from_file(file.path()).await.unwrap_err();
    assert!(matches!(err, QuotaError::Config(_)));
}

#[tokio::test]
async fn test_missing_required_limit_fails_fast() {
    let file = write_config("rate_limit:\n  buckets:\n    internal.router:\n      rpm: 10\n");
    assert!(Config::from_file(file.path()).await.is_err());
}

#[tokio::test]
async fn test_hot_reload_changes_limits() {
    let config = Config::from_yaml_str(CONFIG).unwrap();
    let limiter = RateLimiter::connect(&config).await.unwrap();

    for _ in 0..4 {
        limiter
            .check_and_consume("batch-jobs", &CheckOptions::new())
            .await
            .unwrap();
    }
    assert!(!limiter
        .check_and_consume("batch-jobs", &CheckOptions::new())
        .await
        .unwrap()
        .allowed);

    let reloaded = Config::from_yaml_str(&CONFIG.replace("rpm: 5", "rpm: 20")).unwrap();
    limiter.reload(reloaded.rate_limit()).unwrap();

    let result = limiter
        .check_and_consume("batch-jobs", &CheckOptions::new())
        .await
        .unwrap();
    assert!(result.allowed);
    assert_eq!(result.metadata.rpm_limit, 18);

    let mut broken = reloaded.rate_limit().clone();
    broken.safety_margin = 0.9;
    assert!(limiter.reload(&broken).is_err());
    assert_eq!(
        limiter.registry().resolve("batch-jobs").unwrap().effective_rpm(),
        18
    );
}
