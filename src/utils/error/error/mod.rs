//! Error handling for the quota guard
//!
//! This module defines all error types used throughout the crate.

mod conversions;
mod helpers;
mod types;

pub use types::{CallError, QuotaError, Result};
