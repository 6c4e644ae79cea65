use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::GrokError;

/// Explicit retry policy for outbound model calls: bounded attempts with
/// exponential backoff plus jitter, retrying only errors the predicate in
/// `GrokError::is_retryable` accepts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(2),
            cap: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after the given zero-based attempt:
    /// base * 2^attempt, capped.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base.saturating_mul(2u32.saturating_pow(attempt));
        exp.min(self.cap)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, GrokError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GrokError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let backoff = self.backoff(attempt);
                    let jitter = Duration::from_millis(rand::rng().random_range(0..500));
                    warn!(
                        op = op_name,
                        attempt = attempt + 1,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "Grok call failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff + jitter).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
