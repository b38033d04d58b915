//! Retry with exponential backoff for transient backend errors.

use crate::error::{Error, Result};
use crate::types::RetryConfig;
use std::thread;

/// Callback trait for retry notifications.
pub trait RetryCallback: Sync {
    /// Called before waiting for the next attempt.
    ///
    /// # Arguments
    /// * `attempt` - Attempt that just failed (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The error that triggered the retry
    /// * `delay_ms` - Milliseconds until next attempt
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_ms: u128);
}

/// Callback that does nothing.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _attempt: u32, _max_attempts: u32, _error: &Error, _delay_ms: u128) {}
}

/// Callback that logs each retry at warn level, tagged with a resource identity.
pub struct LogCallback<'a> {
    pub identity: &'a str,
}

impl RetryCallback for LogCallback<'_> {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_ms: u128) {
        log::warn!(
            "{}: attempt {attempt}/{max_attempts} failed: {error}. Retrying in {delay_ms}ms",
            self.identity
        );
    }
}

/// Execute an operation, retrying retryable errors with backoff.
///
/// Non-retryable errors are returned immediately. When every attempt fails,
/// the last error is returned.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt + 1 >= max_attempts => return Err(e),
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                if let Some(cb) = callback {
                    cb.on_retry(attempt + 1, max_attempts, &e, delay.as_millis());
                }
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
