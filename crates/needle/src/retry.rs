use std::{future::Future, time::Duration};

use crate::error::NeedleResult;

/// Bounded exponential backoff around a single fetch.
///
/// Only errors for which [`NeedleError::is_retryable`](crate::NeedleError::is_retryable)
/// holds are retried, everything else is returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one. `0` disables retrying.
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry number `attempt + 1`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> NeedleResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = NeedleResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    let delay = self.delay_for_attempt(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "{e}. Retry {attempt}/{retries} in {delay:?}.",
                        retries = self.retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
