//! Retry with exponential backoff and jitter.
//!
//! The policy is a plain value handed to whoever makes outbound calls, so the
//! schedule and the retryable-error predicate can be tested on their own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::ProviderError;

/// Decides whether an error is worth another attempt.
pub type RetryPredicate = Arc<dyn Fn(&ProviderError) -> bool + Send + Sync>;

/// Retry policy configuration.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Scale each delay by a random factor in [0.75, 1.25).
    pub jitter: bool,
    retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
            retryable: Arc::new(ProviderError::is_transient),
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("max_backoff", &self.max_backoff)
            .field("multiplier", &self.multiplier)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Replace the default predicate ([`ProviderError::is_transient`]).
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ProviderError) -> bool + Send + Sync + 'static,
    {
        self.retryable = Arc::new(predicate);
        self
    }

    pub fn is_retryable(&self, error: &ProviderError) -> bool {
        (self.retryable)(error)
    }

    /// Base delay before retry number `retry` (1-based), without jitter.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exp = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let secs = self.initial_backoff.as_secs_f64() * exp;
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }

    /// Longest total sleep between the first and last attempt, jitter
    /// included. Rate-limit hints are not counted.
    pub fn worst_case_backoff(&self) -> Duration {
        let total: Duration = (1..self.max_attempts.max(1)).map(|n| self.backoff_for(n)).sum();
        if self.jitter { total.mul_f64(1.25) } else { total }
    }

    fn delay_for(&self, retry: u32, error: &ProviderError) -> Duration {
        let mut delay = self.backoff_for(retry);
        if self.jitter {
            let factor = rand::rng().random_range(0.75..1.25);
            delay = Duration::from_secs_f64(delay.as_secs_f64() * factor);
        }
        // Honor the provider's hint, within the cap.
        if let ProviderError::RateLimited { retry_after_secs } = error {
            delay = delay.max(Duration::from_secs(*retry_after_secs).min(self.max_backoff));
        }
        delay
    }

    /// Execute an async operation with retry.
    ///
    /// Non-retryable errors are returned as-is after the attempt that produced
    /// them. Running out of attempts on a retryable error yields
    /// [`ProviderError::RetriesExhausted`], which is itself not retryable.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !self.is_retryable(&error) {
                return Err(error);
            }

            if attempt >= max_attempts {
                tracing::warn!(attempts = attempt, error = %error, "Retries exhausted");
                return Err(ProviderError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let delay = self.delay_for(attempt, &error);
            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after error"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
