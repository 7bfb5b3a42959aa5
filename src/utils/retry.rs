//! Retry utilities with a fixed delay
//!
//! This module provides the retry wrapper used around every outbound delivery.
//! Delays are fixed rather than exponential; failures classified as rate
//! limiting get an extra cooldown before the normal delay.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one (at least 1)
    pub max_attempts: u32,

    /// Fixed delay between attempts
    pub delay: Duration,

    /// Extra pause before retrying a rate-limited attempt
    pub rate_limit_cooldown: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
            rate_limit_cooldown: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempt bound (values below 1 are raised to 1)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.rate_limit_cooldown = cooldown;
        self
    }

    /// Total pause before the next attempt for a given decision
    pub fn pause_for(&self, decision: RetryDecision) -> Duration {
        match decision {
            RetryDecision::Abort => Duration::ZERO,
            RetryDecision::Retry => self.delay,
            RetryDecision::Cooldown(requested) => {
                requested.unwrap_or_default().max(self.rate_limit_cooldown) + self.delay
            }
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Propagate the error without further attempts
    Abort,
    /// Sleep the normal delay and try again
    Retry,
    /// Sleep the rate-limit cooldown (or the server's requested wait, if
    /// longer), then the normal delay, and try again
    Cooldown(Option<Duration>),
}

/// Result of a retry operation
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The final result (success or last error)
    pub result: Result<T, E>,

    /// Number of attempts made
    pub attempts: u32,

    /// Total time spent sleeping between attempts
    pub total_delay: Duration,
}

/// Execute an async operation with bounded, fixed-delay retries
///
/// # Arguments
/// * `config` - Retry configuration
/// * `classify` - Maps an error to the action to take before the next attempt
/// * `operation` - The async operation to execute
///
/// The error of the final attempt is returned unchanged.
pub async fn retry_with_delay<T, E, F, Fut, C>(
    config: &RetryConfig,
    classify: C,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryDecision,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;
    let mut total_delay = Duration::ZERO;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts,
                    total_delay,
                };
            }
            Err(err) => {
                let decision = classify(&err);
                if attempts >= max_attempts || decision == RetryDecision::Abort {
                    return RetryResult {
                        result: Err(err),
                        attempts,
                        total_delay,
                    };
                }

                let delay = config.pause_for(decision);
                total_delay += delay;

                tracing::warn!(
                    attempt = attempts,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    rate_limited = matches!(decision, RetryDecision::Cooldown(_)),
                    error = %err,
                    "Attempt failed, retrying"
                );

                sleep(delay).await;
            }
        }
    }
}
