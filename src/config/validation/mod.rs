//! Configuration validation
//!
//! This module provides validation logic for all configuration structures.
//! Everything is checked once, at load or reload time, so the limiter never
//! resolves a half-valid bucket on the hot path.
//!
//! - `trait_def`: Core Validate trait definition
//! - `rate_limit_validators`: Safety margins, buckets, backpressure, breakers
//! - `storage_validators`: Storage-related validators
//! - `tests`: Test suite for all validators

mod rate_limit_validators;
mod storage_validators;
mod trait_def;

pub use rate_limit_validators::validate_safety_margin;
pub use trait_def::Validate;
