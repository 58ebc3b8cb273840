//! Bounded retry for fetches and other transient failures.

use crate::error::{Error, Result};
use std::thread;
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay between attempts
    pub base_delay: Duration,
    /// Multiplier for exponential backoff (1.0 = fixed delay)
    pub backoff_factor: f64,
    /// Maximum delay between attempts
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            backoff_factor: 1.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Fixed delay between a bounded number of attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            backoff_factor: 1.0,
            max_delay: delay,
        }
    }

    /// Calculate the delay after a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Callback for retry progress notifications.
pub trait RetryCallback {
    /// Called when an operation is about to be retried.
    ///
    /// `attempt` is the 1-indexed attempt that just failed.
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration);
}

/// Callback that logs retries as warnings.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration) {
        log::warn!(
            "attempt {}/{} failed: {}; retrying in {}s",
            attempt,
            max_attempts,
            error,
            delay.as_secs()
        );
    }
}

/// Execute an operation with bounded retry.
///
/// Retries only errors whose category is retryable. Returns the last error
/// once all attempts are used.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation(attempt + 1) {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() || attempt + 1 >= max_attempts {
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt);
                if let Some(cb) = callback {
                    cb.on_retry(attempt + 1, max_attempts, &e, delay);
                }
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast() -> RetryConfig {
        RetryConfig::fixed(3, Duration::from_millis(1))
    }

    fn validation_error() -> Error {
        Error::ValidationFailed {
            artifact: "awscliv2.zip".to_string(),
            reason: "too small".to_string(),
        }
    }

    #[test]
    fn test_with_retry_success_first_try() {
        let result = with_retry(&RetryConfig::no_retry(), None, |_| Ok::<_, Error>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_with_retry_non_retryable_error() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&fast(), None, |_| {
            attempts.set(attempts.get() + 1);
            Err(Error::precondition("no sudo"))
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_with_retry_eventual_success() {
        let attempts = Cell::new(0);
        let result = with_retry(&fast(), None, |n| {
            attempts.set(n);
            if n < 3 { Err(validation_error()) } else { Ok(n) }
        });

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_with_retry_all_attempts_fail() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&fast(), None, |_| {
            attempts.set(attempts.get() + 1);
            Err(validation_error())
        });

        assert!(matches!(result, Err(Error::ValidationFailed { .. })));
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_callback_invoked_between_attempts() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingCallback(AtomicU32);
        impl RetryCallback for CountingCallback {
            fn on_retry(&self, _: u32, _: u32, _: &Error, _: Duration) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let callback = CountingCallback(AtomicU32::new(0));
        let _: Result<()> = with_retry(&fast(), Some(&callback), |_| Err(validation_error()));

        assert_eq!(callback.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fixed_delay() {
        let config = RetryConfig::fixed(3, Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
    }
}
