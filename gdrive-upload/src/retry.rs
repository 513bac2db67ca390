use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::error::error_chain;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_MULTIPLIER: u32 = 2;

/// Raised once every attempt of an operation has failed. The last
/// underlying error is its source.
#[derive(Debug, Error)]
#[error("retries exhausted for {label} after {attempts} attempt(s)")]
pub struct RetryError<E>
where
    E: std::error::Error + 'static,
{
    pub label: String,
    pub attempts: u32,
    #[source]
    pub source: E,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    multiplier: u32,
}

impl Backoff {
    pub fn new(base: Duration, multiplier: u32) -> Self {
        Self {
            base,
            multiplier: multiplier.max(1),
        }
    }

    /// Delay slept after the failure of attempt `attempt + 1`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.min(16));
        self.base.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Backoff::new(
                Duration::from_millis(DEFAULT_BASE_DELAY_MS),
                DEFAULT_MULTIPLIER,
            ),
        )
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_env() -> Self {
        let max_attempts = read_u64_env("GDRIVE_RETRY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS.into());
        let base_ms = read_u64_env("GDRIVE_RETRY_BASE_DELAY_MS", DEFAULT_BASE_DELAY_MS);
        let multiplier = read_u64_env("GDRIVE_RETRY_MULTIPLIER", DEFAULT_MULTIPLIER.into());
        Self::new(
            u32::try_from(max_attempts).unwrap_or(DEFAULT_MAX_ATTEMPTS),
            Backoff::new(
                Duration::from_millis(base_ms),
                u32::try_from(multiplier).unwrap_or(DEFAULT_MULTIPLIER),
            ),
        )
    }

    /// Runs `operation` until it succeeds or `max_attempts` is reached,
    /// sleeping with exponential backoff in between. Every failure is
    /// retried the same way.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let mut attempt = 1u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(source) if attempt >= self.max_attempts => {
                    return Err(RetryError {
                        label: label.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    let delay = self.backoff.delay(attempt - 1);
                    warn!(
                        "{label} failed (attempt {attempt}/{}): {}; retrying in {}ms",
                        self.max_attempts,
                        error_chain(&err),
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
