// Bounded retry-with-backoff shared by ordinary and constrained feed positions.
//
// There is no cancellation token here: the caller supplies a `still_wanted`
// guard that is consulted before every attempt and after every backoff sleep,
// so a superseded retry chain stops without acting.

use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use tracing::warn;

use crate::error::PlaybackError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial attempt).
    pub max_retries: u32,
    /// Base delay between retries. Actual delay = base * 2^attempt + jitter.
    pub base_delay: Duration,
    /// Hard cap on the computed delay.
    pub max_delay: Duration,
    /// Adds random jitter of [0, base_delay/2), never exceeding `max_delay`.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Compute the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // 2^attempt with a checked shift so attempts >= 32 saturate.
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let exp_delay = self
            .base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay);
        let capped = exp_delay.min(self.max_delay);

        if !self.jitter {
            return capped;
        }

        let jitter_range_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX) / 2;
        let remaining_ms =
            u64::try_from(self.max_delay.saturating_sub(capped).as_millis()).unwrap_or(0);
        let jitter_limit_ms = jitter_range_ms.min(remaining_ms);
        if jitter_limit_ms == 0 {
            return capped;
        }

        let jitter_ms = rand::rng().random_range(0..jitter_limit_ms);
        (capped + Duration::from_millis(jitter_ms)).min(self.max_delay)
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Result of a single attempt, used by the caller to signal retryability.
pub enum RetryAction<T> {
    /// Operation succeeded.
    Success(T),
    /// Transient failure (autoplay policy, decoder busy).
    Retry(PlaybackError),
    /// Permanent failure; stop immediately.
    Fail(PlaybackError),
}

impl<T> From<Result<T, PlaybackError>> for RetryAction<T> {
    fn from(result: Result<T, PlaybackError>) -> Self {
        match result {
            Ok(value) => RetryAction::Success(value),
            Err(err) if err.is_retryable() => RetryAction::Retry(err),
            Err(err) => RetryAction::Fail(err),
        }
    }
}

/// Outcome of a retry chain together with the number of attempts made.
#[derive(Debug)]
pub struct RetryReport<T> {
    pub result: Result<T, PlaybackError>,
    pub attempts: u32,
}

impl<T> RetryReport<T> {
    /// Number of attempts that failed before the chain ended.
    pub fn failed_attempts(&self) -> u32 {
        match self.result {
            Ok(_) => self.attempts.saturating_sub(1),
            Err(_) => self.attempts,
        }
    }
}

/// Execute an async operation with retry-and-backoff.
///
/// `operation` receives the 0-indexed attempt number. `still_wanted` is checked
/// before each attempt and after each sleep; once it returns false the chain
/// ends with [`PlaybackError::Superseded`] for `index`.
pub async fn retry_with_backoff<F, Fut, G, T>(
    policy: &RetryPolicy,
    index: usize,
    still_wanted: G,
    operation: F,
) -> RetryReport<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = RetryAction<T>>,
    G: Fn() -> bool,
{
    let mut attempts = 0;

    for attempt in 0..=policy.max_retries {
        if !still_wanted() {
            return RetryReport {
                result: Err(PlaybackError::Superseded { index }),
                attempts,
            };
        }

        attempts += 1;
        match operation(attempt).await {
            RetryAction::Success(value) => {
                return RetryReport {
                    result: Ok(value),
                    attempts,
                };
            }
            RetryAction::Fail(err) => {
                return RetryReport {
                    result: Err(err),
                    attempts,
                };
            }
            RetryAction::Retry(err) => {
                if attempt >= policy.max_retries {
                    return RetryReport {
                        result: Err(err),
                        attempts,
                    };
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    index,
                    attempt = attempt + 1,
                    max = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying playback after transient error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    // The loop covers 0..=max_retries and the last iteration always returns.
    RetryReport {
        result: Err(PlaybackError::Internal {
            reason: "retry loop exited without result".to_string(),
        }),
        attempts,
    }
}
