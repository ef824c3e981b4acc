//! Bounded retries with per-attempt timeouts for provider calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::provider::ProviderError;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * factor^retry`, capped at `max`, with optional +/- 50% jitter.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(500),
            factor: 2.0,
            max: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (0-based).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::Fixed(delay) => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let capped = (base.as_secs_f64() * factor.powi(exponent)).min(max.as_secs_f64());
                let scaled = if jitter {
                    capped * (0.5 + fastrand::f64())
                } else {
                    capped
                };
                Duration::from_secs_f64(scaled.max(0.0))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Upper bound on a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::default(),
            attempt_timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry(attempt_timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::Fixed(Duration::ZERO),
            attempt_timeout,
        }
    }

    /// Same schedule with the attempt timeout stretched to cover a sequential
    /// fan-out over `items` calls, each of which may spend its own retries.
    pub fn for_batch(&self, items: usize) -> Self {
        let calls = u32::try_from(items.max(1))
            .unwrap_or(u32::MAX)
            .saturating_mul(self.max_retries.saturating_add(1));
        Self {
            attempt_timeout: self.attempt_timeout.saturating_mul(calls),
            ..self.clone()
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent. An attempt exceeding the timeout counts
    /// as a retryable [`ProviderError::timeout`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retry = 0;
        loop {
            let error = match tokio::time::timeout(self.attempt_timeout, operation()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => error,
                Err(_) => ProviderError::timeout(format!(
                    "{label} exceeded {} ms",
                    self.attempt_timeout.as_millis()
                )),
            };

            if !error.retryable() || retry >= self.max_retries {
                return Err(error);
            }

            let delay = self.backoff.delay(retry);
            warn!(
                operation = label,
                attempt = retry + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "retrying after transient provider failure"
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
