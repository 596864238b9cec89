//! End-to-end tests against a real Redis
//!
//! Run with: `REDIS_URL=redis://localhost:6379 cargo test -- --ignored`

pub mod redis_limiter;
