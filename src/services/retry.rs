use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing::warn;

use super::ServiceError;

const JITTER_RATIO: f64 = 0.1;

/// Bounded retry for definition-service calls: each attempt runs under
/// `call_timeout`, failures back off exponentially up to `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            call_timeout: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), without jitter.
    pub fn backoff_for(&self, retry: usize) -> Duration {
        let factor = 1u32.checked_shl(retry.min(31) as u32).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Raises the per-attempt timeout to `inner` so an attempt is never cut
    /// off before the client's own request timeout fires.
    pub fn covering(self, inner: Duration) -> Self {
        Self {
            call_timeout: self.call_timeout.max(inner),
            ..self
        }
    }

    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut retry = 0;

        loop {
            let result = match timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ServiceError::TimedOut(self.call_timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && retry + 1 < attempts => {
                    let backoff = apply_jitter(self.backoff_for(retry));
                    warn!(operation, retry, error = %err, ?backoff, "service call failed, retrying");
                    sleep(backoff).await;
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn apply_jitter(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }
    let base_ms = base.as_millis() as f64;
    let mut rng = rand::rng();
    let factor = rng.random_range(1.0 - JITTER_RATIO..=1.0 + JITTER_RATIO);
    Duration::from_millis((base_ms * factor).round().max(1.0) as u64)
}
