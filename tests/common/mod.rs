//! Common test utilities for quota-guard

pub mod fixtures;

pub use fixtures::{TestLimiter, bucket_config, start_time};

/// Skip test if environment variable is not set
#[macro_export]
macro_rules! skip_without_env {
    ($var:expr) => {
        if std::env::var($var).is_err() {
            eprintln!("Skipping test: {} environment variable not set", $var);
            return;
        }
    };
}
