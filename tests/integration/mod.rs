//! Integration tests for quota-guard
//!
//! These tests drive the public facade end to end on the in-memory store.

pub mod concurrency_tests;
pub mod config_loading_tests;
pub mod protection_tests;
