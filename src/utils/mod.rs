//! # Utilities
//!
//! Shared helpers used across the harness components.

pub mod retry;

pub use retry::{poll_until, retry_with_backoff, PollTimeout, RetryConfig, RetryExhausted};
