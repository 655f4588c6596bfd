//! # Observability Infrastructure
//!
//! Structured logging for scenario runs. Every step executes inside a
//! `step` span so log lines can be grouped by scenario, step and run id.

pub mod logging;

pub use logging::{init_logging, log_config_info};
