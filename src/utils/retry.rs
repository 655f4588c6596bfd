//! Retry and polling primitives
//!
//! Bounded retries with exponential backoff for flaky external tooling
//! (proxy exec sessions), and deadline-bounded polling for asynchronous
//! config propagation. Neither ever waits past its budget.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

/// Retry configuration with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (at least one attempt is always made)
    pub max_attempts: u32,
    /// Initial delay between attempts
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles each time)
    pub backoff_multiplier: f64,
    /// Description for logging purposes
    pub description: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            description: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Retry config with a fixed attempt budget and initial delay
    pub fn attempts(max_attempts: u32, initial_delay: Duration) -> Self {
        Self { max_attempts, initial_delay, ..Default::default() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Outcome of an exhausted retry budget
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Retry a future until it succeeds or the attempt budget is spent.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    mut f: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 1;

    loop {
        match f(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, description = %config.description, "Retry succeeded");
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                debug!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    description = %config.description,
                    "Attempt failed, will retry"
                );
                sleep(delay).await;
                delay = Duration::from_millis(
                    ((delay.as_millis() as f64) * config.backoff_multiplier) as u64,
                )
                .min(config.max_delay);
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts,
                    error = %e,
                    description = %config.description,
                    "Retry exhausted all attempts"
                );
                return Err(RetryExhausted { attempts: attempt, last_error: e });
            }
        }
    }
}

/// Why a poll ended without its condition holding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTimeout {
    pub attempts: u32,
    pub last_observation: Option<String>,
}

/// Poll `check` every `interval` until it reports `Ok(true)` or `deadline` elapses.
///
/// `Ok(false)` and `Err(_)` both mean "not yet"; the most recent error is kept
/// for diagnostics. The deadline also bounds a single `check` that never returns.
pub async fn poll_until<F, Fut, E>(
    deadline: Duration,
    interval: Duration,
    label: &str,
    mut check: F,
) -> Result<(), PollTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last_observation: Option<String> = None;

    let polled = timeout(deadline, async {
        loop {
            attempts += 1;
            match check().await {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => {
                    debug!(label, attempt = attempts, error = %e, "Poll observation failed");
                    last_observation = Some(e.to_string());
                }
            }

            let remaining = deadline.saturating_sub(start.elapsed());
            let pause = interval.min(remaining);
            if pause > Duration::ZERO {
                sleep(pause).await;
            }
        }
    })
    .await;

    match polled {
        Ok(()) => {
            debug!(label, attempts, elapsed_ms = start.elapsed().as_millis() as u64, "Poll satisfied");
            Ok(())
        }
        Err(_elapsed) => {
            warn!(label, attempts, deadline_ms = deadline.as_millis() as u64, "Poll deadline exceeded");
            Err(PollTimeout { attempts, last_observation })
        }
    }
}
