//! Retry logic with exponential backoff
//!
//! Used for the read-only HTTP calls to the registry and to GitHub. Commands
//! that change remote state (publishing, pushing) are never retried.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Options for retry behavior
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

/// Executes operations with exponential backoff
///
/// ```no_run
/// use cheminfo_tools::core::{RetryManager, RetryOptions};
///
/// # async fn fetch() -> anyhow::Result<String> {
/// let manager = RetryManager::new(RetryOptions::default());
/// let body = manager
///     .retry(|| async { Ok::<_, anyhow::Error>("{}".to_string()) })
///     .await?;
/// # Ok(body)
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryManager {
    options: RetryOptions,
}

impl RetryManager {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    /// Run `operation` until it succeeds, fails with a non-transient error,
    /// or runs out of attempts. The last error is returned.
    pub async fn retry<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut delay = self.options.initial_delay;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if attempt >= self.options.max_attempts || !is_transient_error(&error) {
                        return Err(error);
                    }

                    log::debug!(
                        "attempt {}/{} failed ({}), retrying in {:?}",
                        attempt,
                        self.options.max_attempts,
                        error,
                        delay
                    );
                    sleep(delay).await;

                    delay = Duration::from_secs_f64(
                        delay.as_secs_f64() * self.options.backoff_multiplier,
                    )
                    .min(self.options.max_delay);
                    attempt += 1;
                }
            }
        }
    }
}

/// Whether an error looks like a network hiccup or an overloaded server
pub fn is_transient_error<E: std::fmt::Display>(error: &E) -> bool {
    let message = error.to_string().to_lowercase();

    const TRANSIENT_PATTERNS: &[&str] = &[
        "econnrefused",
        "enotfound",
        "etimedout",
        "econnreset",
        "error sending request",
        "connection refused",
        "connection reset",
        "timed out",
        "timeout",
        "429 too many requests",
        "502 bad gateway",
        "503 service unavailable",
        "504 gateway timeout",
    ];

    TRANSIENT_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}
