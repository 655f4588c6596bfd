//! # Structured Logging
//!
//! Subscriber setup and span helpers built on the tracing ecosystem.
//!
//! `RUST_LOG` always takes precedence over the configured level so a single
//! failing step can be re-run with `RUST_LOG=meshverify=debug`.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;
use crate::errors::{Error, Result};

/// Create a tracing span for a scenario step.
///
/// ```rust,ignore
/// let span = step_span!("ecc-strict-mtls", "decode certificate", run_id);
/// ```
#[macro_export]
macro_rules! step_span {
    ($scenario:expr, $step:expr, $run_id:expr) => {
        tracing::info_span!(
            "step",
            scenario = %$scenario,
            step = %$step,
            run_id = %$run_id
        )
    };
    ($scenario:expr, $step:expr, $run_id:expr, $($field:tt)*) => {
        tracing::info_span!(
            "step",
            scenario = %$scenario,
            step = %$step,
            run_id = %$run_id,
            $($field)*
        )
    };
}

/// Create a tracing span for a kubectl invocation
#[macro_export]
macro_rules! kubectl_span {
    ($verb:expr, $namespace:expr) => {
        tracing::debug_span!("kubectl", verb = %$verb, namespace = %$namespace)
    };
}

fn build_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level))
}

/// Install the global subscriber. Logs go to stderr; stdout carries reports.
///
/// Returns an error when a subscriber is already installed, which callers
/// embedding the harness in a larger test binary may choose to ignore.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = build_filter(settings);

    let result = if settings.json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).try_init()
    };

    result.map_err(|e| Error::internal(format!("Failed to install log subscriber: {}", e)))
}

/// Log the effective settings at startup
pub fn log_config_info(config: &crate::config::HarnessConfig) {
    tracing::info!(
        cluster_kind = ?config.cluster.kind,
        namespace = %config.namespace,
        wait_timeout_secs = config.wait.timeout_secs,
        probe_mode = ?config.probe.mode,
        proxy_container = %config.capture.container,
        capture_attempts = config.capture.attempts,
        "meshverify configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = step_span!("ecc-strict-mtls", "apply peer-authentication", "run-1");
        let _span = step_span!("ecc-strict-mtls", "call server", "run-1", call_count = 1);
        let _span = kubectl_span!("apply", "echo");
    }

    #[test]
    fn test_log_config_info() {
        let config = crate::config::HarnessConfig::default();

        // This should not panic
        log_config_info(&config);
    }
}
