//! Retry logic with exponential backoff for provider setup requests.
//!
//! Only the Cloudflare provider's metadata and discovery requests go
//! through here. The measurement runner itself never retries.

use crate::errors::BoxError;
use log::{debug, warn};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Default number of retry attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default base delay for exponential backoff (in milliseconds).
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;

/// Maximum delay cap for exponential backoff (in milliseconds).
pub const DEFAULT_MAX_DELAY_MS: u64 = 2000;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration.
    pub fn new(
        max_retries: u32,
        base_delay_ms: u64,
        max_delay_ms: u64,
    ) -> Self {
        Self { max_retries, base_delay_ms, max_delay_ms }
    }

    /// Calculate the delay for a given attempt number using exponential backoff.
    ///
    /// The delay is calculated as: base_delay * 2^attempt, capped at max_delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
        let capped_delay_ms = delay_ms.min(self.max_delay_ms);
        Duration::from_millis(capped_delay_ms)
    }
}

/// Error that wraps the last error from a series of retry attempts.
#[derive(Debug)]
pub struct RetryError {
    /// The last error that occurred.
    pub last_error: BoxError,
    /// Number of attempts made.
    pub attempts: u32,
    /// Description of the operation that failed.
    pub operation: String,
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed after {} attempts: {}",
            self.operation, self.attempts, self.last_error
        )
    }
}

impl Error for RetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.last_error.as_ref())
    }
}

/// Execute an async operation with retry logic and exponential backoff.
///
/// Errors that do not look transient end the loop immediately.
pub async fn retry_async<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T, RetryError>
where
    E: Into<BoxError>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let total_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt - 1);
            debug!(
                "{}: Retry attempt {}/{} after {:?} delay",
                operation_name, attempt, config.max_retries, delay
            );
            sleep(delay).await;
        }

        let error: BoxError = match f().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        "{}: Succeeded on attempt {}",
                        operation_name,
                        attempt + 1
                    );
                }
                return Ok(result);
            }
            Err(e) => e.into(),
        };

        attempt += 1;

        if attempt >= total_attempts || !is_retryable_error(error.as_ref()) {
            warn!(
                "{}: Giving up after {} attempt(s). Last error: {}",
                operation_name, attempt, error
            );
            return Err(RetryError {
                last_error: error,
                attempts: attempt,
                operation: operation_name.to_string(),
            });
        }

        warn!("{}: Attempt {} failed: {}", operation_name, attempt, error);
    }
}

/// Check if an error is retryable (network-related).
///
/// This function determines if an error is likely to be transient
/// and worth retrying, such as connection timeouts or temporary
/// network issues.
pub fn is_retryable_error(error: &(dyn Error + Send + Sync)) -> bool {
    let error_str = error.to_string().to_lowercase();

    let retryable_patterns = [
        "connection refused",
        "connection reset",
        "connection timed out",
        "timeout",
        "timed out",
        "temporarily unavailable",
        "network unreachable",
        "host unreachable",
        "no route to host",
        "broken pipe",
        "connection aborted",
        "error sending request",
        "try again",
        "interrupted",
        "dns",
        "resolve",
    ];

    retryable_patterns.iter().any(|pattern| error_str.contains(pattern))
}
