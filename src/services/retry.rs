//! Retry with exponential backoff
//!
//! Runs a downstream operation until it succeeds, fails terminally, or the
//! retry budget is spent.

use crate::config::RetryConfig;
use crate::services::classifier::is_non_retryable;
use crate::utils::error::EngineError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Record of one failed attempt
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// Zero-based attempt index
    pub attempt: u32,
    /// Failure observed on this attempt
    pub error: EngineError,
    /// Delay slept before the next attempt, `None` when no retry followed
    pub delay: Option<Duration>,
}

/// Retry policy built from `RetryConfig`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Create a retry policy
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Upper bound on operation invocations per call
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries.saturating_add(1)
    }

    /// Backoff before the retry that follows `attempt`, without jitter:
    /// `min(base * multiplier^attempt, max)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.config.backoff_multiplier).saturating_pow(attempt);
        let delay_ms = self
            .config
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.config.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Uniform jitter in `[0, max_jitter)`
    pub fn jitter(&self) -> Duration {
        if self.config.max_jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..self.config.max_jitter_ms))
    }

    /// Sum of un-jittered backoff delays across a fully exhausted call
    pub fn total_backoff(&self) -> Duration {
        (0..self.config.max_retries).map(|attempt| self.backoff_delay(attempt)).sum()
    }

    /// Execute `operation` with retries.
    ///
    /// Returns the first success. Non-retryable failures are returned
    /// immediately; otherwise the last failure is returned once
    /// `max_retries + 1` attempts have been made.
    pub async fn execute_with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let mut history: Vec<RetryAttempt> = Vec::new();

        for attempt in 0..=self.config.max_retries {
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!("Operation succeeded after {} attempts", attempt + 1);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            warn!("Attempt {} failed: {}", attempt + 1, error);

            if is_non_retryable(&error) {
                debug!("Non-retryable error, failing immediately");
                return Err(error);
            }

            if attempt == self.config.max_retries {
                let slept: Duration = history.iter().filter_map(|a| a.delay).sum();
                warn!(
                    "Max retries ({}) reached after {:.0}ms of backoff",
                    self.config.max_retries,
                    slept.as_secs_f64() * 1000.0
                );
                return Err(error);
            }

            let delay = self.backoff_delay(attempt) + self.jitter();
            info!("Retrying in {}ms...", delay.as_millis());

            history.push(RetryAttempt {
                attempt,
                error,
                delay: Some(delay),
            });

            tokio::time::sleep(delay).await;
        }

        // The loop returns on every path of its final iteration
        Err(history
            .pop()
            .map(|last| last.error)
            .unwrap_or_else(|| EngineError::with_message("Unknown error during retry attempts")))
    }
}
