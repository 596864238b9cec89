//! Utility modules
//!
//! - **error**: Error taxonomy and failure isolation (circuit breaker)

pub mod error;
