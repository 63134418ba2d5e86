// Retries for segment requests. The wait doubles per retry up to a ceiling
// and is abandoned as soon as the run is cancelled.

use crate::error::DownloadError;
use rand::RngExt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How often, and how patiently, a failed segment request is repeated.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry; doubled for each later one.
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Spread concurrent retries by up to half the base delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after the first failure.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn backoff(&self, retry: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay);
        if !self.jitter {
            return delay;
        }
        let spread = (self.base_delay / 2).min(self.max_delay - delay);
        let spread_ms = spread.as_millis() as u64;
        if spread_ms == 0 {
            delay
        } else {
            delay + Duration::from_millis(rand::rng().random_range(0..spread_ms))
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy is exhausted.
///
/// The closure receives the attempt number (0-indexed). Whether an error is
/// retried is decided by [`DownloadError::is_retryable`].
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    operation: F,
) -> Result<T, DownloadError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, DownloadError>>,
{
    let mut attempt = 0;
    loop {
        if token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= policy.max_retries {
            return Err(err);
        }

        let delay = policy.backoff(attempt);
        warn!(
            attempt = attempt + 1,
            max = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after transient error"
        );
        tokio::select! {
            _ = token.cancelled() => return Err(DownloadError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
