//! Core functionality for the quota guard

pub mod rate_limiter;
