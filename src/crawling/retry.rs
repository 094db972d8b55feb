//! Retry policy for platform fetches
//!
//! Only transient failures (`Timeout`, `NetworkError`) are retried, with
//! capped exponential backoff plus uniform jitter. Every backoff wait is a
//! suspension point that observes the search's cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{FetchError, Platform};
use crate::infrastructure::config::RetryConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: Duration::ZERO,
        }
    }

    pub fn should_retry(&self, error: &FetchError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_attempts
    }

    /// Backoff before attempt `attempt + 1`, without jitter
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Backoff plus a jitter drawn uniformly from `0..=jitter`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..=jitter_ms))
        };
        self.backoff_for(attempt) + jitter
    }
}

/// How a retried operation ended
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    Exhausted { error: FetchError, attempts: u32 },
    Cancelled { attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => {
                *attempts
            }
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, runs out of
/// attempts or `cancel` fires. `operation` receives the 1-based attempt number.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    platform: Platform,
    cancel: &CancellationToken,
    mut operation: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return RetryOutcome::Cancelled { attempts: attempt };
        }
        attempt += 1;
        debug!("[{}] attempt {}/{}", platform, attempt, policy.max_attempts);

        let error = match operation(attempt).await {
            Ok(value) => return RetryOutcome::Success { value, attempts: attempt },
            Err(error) => error,
        };
        if cancel.is_cancelled() {
            return RetryOutcome::Cancelled { attempts: attempt };
        }

        if !policy.should_retry(&error, attempt) {
            if error.is_transient() {
                warn!("[{}] giving up after {} attempts: {}", platform, attempt, error);
            } else {
                warn!("[{}] permanent failure, not retrying: {}", platform, error);
            }
            return RetryOutcome::Exhausted { error, attempts: attempt };
        }

        let delay = policy.delay_for(attempt);
        warn!("[{}] attempt {} failed ({}), retrying in {:?}", platform, attempt, error, delay);
        tokio::select! {
            () = cancel.cancelled() => return RetryOutcome::Cancelled { attempts: attempt },
            () = tokio::time::sleep(delay) => {}
        }
    }
}
