//! Retry policy with exponential backoff and jitter.

use crate::FitbitError;
use rand::{RngExt, rng};
use std::time::Duration;
use tokio::sync::watch;

/// Retry policy for API calls. `max_retries: None` retries transient
/// failures indefinitely, which is the baseline for conversion runs:
/// upstream rate limiting and flaky intraday endpoints are expected, and
/// a long wait beats a corrupt half-converted range.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn bounded(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            ..Self::default()
        }
    }

    /// Run `f`, retrying while the error is transient. Non-transient
    /// errors propagate immediately.
    pub async fn run<F, Fut, T>(&self, mut f: F) -> Result<T, FitbitError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, FitbitError>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if let Some(max) = self.max_retries {
                        if attempt > max {
                            return Err(e);
                        }
                    }
                    metrics::counter!("fitbit_client_retries_total").increment(1);
                    tracing::warn!(attempt, error = %e, "transient failure, retrying");
                    tokio::time::sleep(self.delay_for(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Like [`run`](Self::run), but aborts between attempts when the
    /// cancellation watch flips to `true`. Cancellation never interrupts
    /// an in-flight attempt, so cache writes stay whole.
    pub async fn run_cancellable<F, Fut, T>(
        &self,
        mut f: F,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<T, FitbitError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, FitbitError>>,
    {
        let mut attempt = 0u32;
        loop {
            if *cancel_rx.borrow() {
                return Err(FitbitError::Cancelled);
            }
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if let Some(max) = self.max_retries {
                        if attempt > max {
                            return Err(e);
                        }
                    }
                    metrics::counter!("fitbit_client_retries_total").increment(1);
                    tracing::warn!(attempt, error = %e, "transient failure, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(self.delay_for(attempt)) => {}
                        _ = cancel_rx.changed() => {
                            if *cancel_rx.borrow() {
                                return Err(FitbitError::Cancelled);
                            }
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    // exponential backoff with jitter
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay);
        let cap = exp.as_millis().max(1) as u64;
        let jitter = rng().random_range(0..cap);
        Duration::from_millis(jitter)
    }
}
