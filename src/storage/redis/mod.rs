//! Redis counter store
//!
//! ## Module Structure
//!
//! - `pool` - Connection setup and health checks
//! - `scripts` - Lua scripts for atomic check-and-insert
//! - `counters` - `CounterStore` implementation
//! - `tests` - Module tests

mod counters;
mod pool;
mod scripts;

pub use pool::RedisPool;
