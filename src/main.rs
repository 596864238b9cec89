//! quota-guard - operator CLI for the shared rate limiter
//!
//! Inspect bucket usage and health, reset counters, or run a single check
//! against the configured store.

#![allow(missing_docs)]

use clap::{Parser, Subcommand};
use quota_guard::{CheckOptions, Config, RateLimiter};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "quota-guard", version, about = "Inspect and manage shared rate limits")]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "QUOTA_GUARD_CONFIG", default_value = "config/quota-guard.yaml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report store reachability, circuit states, and utilization
    Health,
    /// Report usage of every configured bucket
    Stats,
    /// Clear stored counters
    Reset {
        /// Only reset this bucket
        #[arg(long)]
        bucket: Option<String>,
    },
    /// Run one check-and-consume against a bucket
    Check {
        bucket: String,
        /// Estimated token usage
        #[arg(long)]
        tokens: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging system
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> quota_guard::Result<ExitCode> {
    let config = Config::from_file(&cli.config).await?;
    let limiter = RateLimiter::connect(&config).await?;

    match cli.command {
        Command::Health => {
            let report = limiter.health_check().await;
            print_json(&report)?;
            Ok(if report.backend_reachable {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Stats => {
            print_json(&limiter.get_usage_stats().await?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset { bucket } => {
            limiter.reset_limits(bucket.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { bucket, tokens } => {
            let opts = CheckOptions {
                token_count: tokens,
                ..CheckOptions::default()
            };
            let result = limiter.check_and_consume(&bucket, &opts).await?;
            print_json(&result)?;
            Ok(if result.allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> quota_guard::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
