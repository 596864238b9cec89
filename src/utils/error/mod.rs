//! Error handling utilities
//!
//! This module provides the error taxonomy surfaced to callers and the
//! circuit breaker used to isolate failing providers.

pub mod error;
pub mod recovery;

// Re-export commonly used types
pub use error::*;
pub use recovery::*;
