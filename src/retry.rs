//! Transport retry strategies and predicates.
//!
//! Retries happen inside [`Client`](crate::Client), below classification. By
//! default nothing is retried: each recipients call is one request.

use crate::Error;
use rand::Rng;
use std::time::Duration;

/// How long to wait before each retry, and when to give up.
///
/// ```
/// use contactdb::RetryStrategy;
/// use std::time::Duration;
///
/// // 200ms, 400ms, 800ms, then give up
/// let strategy = RetryStrategy::ExponentialBackoff {
///     initial_delay: Duration::from_millis(200),
///     max_delay: Duration::from_secs(5),
///     max_retries: 3,
///     jitter: false,
/// };
/// assert_eq!(strategy.delay_for_attempt(3), Some(Duration::from_millis(800)));
/// assert_eq!(strategy.delay_for_attempt(4), None);
/// ```
#[derive(Debug, Clone, Default)]
pub enum RetryStrategy {
    /// Never retry.
    #[default]
    None,

    /// Double the delay after every attempt, up to `max_delay`.
    ExponentialBackoff {
        /// Delay before the first retry.
        initial_delay: Duration,
        /// Upper bound for any single delay.
        max_delay: Duration,
        /// Retries allowed after the first attempt.
        max_retries: usize,
        /// Scale each delay by a random factor in `0.5..=1.0`.
        jitter: bool,
    },

    /// Wait the same amount before every retry.
    Linear {
        /// Delay before each retry.
        delay: Duration,
        /// Retries allowed after the first attempt.
        max_retries: usize,
    },
}

impl RetryStrategy {
    /// Returns the delay to wait after failed attempt `attempt` (1-indexed),
    /// or `None` once retries are exhausted.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        match self {
            RetryStrategy::None => None,
            RetryStrategy::ExponentialBackoff {
                initial_delay,
                max_delay,
                max_retries,
                jitter,
            } => {
                if attempt == 0 || attempt > *max_retries {
                    return None;
                }

                let shift = u32::try_from(attempt - 1).unwrap_or(u32::MAX).min(31);
                let delay = initial_delay
                    .saturating_mul(1u32 << shift)
                    .min(*max_delay);

                if *jitter {
                    let factor = rand::thread_rng().gen_range(0.5..=1.0);
                    Some(delay.mul_f64(factor))
                } else {
                    Some(delay)
                }
            }
            RetryStrategy::Linear { delay, max_retries } => {
                (attempt > 0 && attempt <= *max_retries).then_some(*delay)
            }
        }
    }
}

/// Decides whether a failed attempt is worth repeating.
///
/// ```
/// use contactdb::{Error, RetryPredicate};
///
/// struct RetryOnRateLimit;
///
/// impl RetryPredicate for RetryOnRateLimit {
///     fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
///         error.status().is_some_and(|status| status.as_u16() == 429)
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// `attempt` is the 1-indexed number of the attempt that just failed.
    fn should_retry(&self, error: &Error, attempt: usize) -> bool;
}

/// Retries whatever [`Error::is_retryable`] accepts. The default.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnRetryable;

impl RetryPredicate for RetryOnRetryable {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, StatusCode};

    fn http_error(status: StatusCode) -> Error {
        Error::HttpError {
            status,
            raw_response: String::new(),
            headers: HeaderMap::new(),
            rate_limit_info: None,
        }
    }

    #[test]
    fn test_exponential_backoff_delays() {
        let strategy = RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            max_retries: 4,
            jitter: false,
        };

        assert_eq!(strategy.delay_for_attempt(1), Some(Duration::from_millis(100)));
        assert_eq!(strategy.delay_for_attempt(2), Some(Duration::from_millis(200)));
        assert_eq!(strategy.delay_for_attempt(3), Some(Duration::from_millis(400)));
        assert_eq!(strategy.delay_for_attempt(4), Some(Duration::from_millis(500)));
        assert_eq!(strategy.delay_for_attempt(5), None);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let strategy = RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            max_retries: 1,
            jitter: true,
        };

        for _ in 0..20 {
            let delay = strategy.delay_for_attempt(1).unwrap();
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(100));
        }
    }

    #[test]
    fn test_linear_delays() {
        let strategy = RetryStrategy::Linear {
            delay: Duration::from_secs(1),
            max_retries: 2,
        };

        assert_eq!(strategy.delay_for_attempt(1), Some(Duration::from_secs(1)));
        assert_eq!(strategy.delay_for_attempt(2), Some(Duration::from_secs(1)));
        assert_eq!(strategy.delay_for_attempt(3), None);
    }

    #[test]
    fn test_no_retry_by_default() {
        let strategy = RetryStrategy::default();
        assert_eq!(strategy.delay_for_attempt(1), None);
    }

    #[test]
    fn test_retry_on_retryable() {
        let predicate = RetryOnRetryable;

        assert!(predicate.should_retry(&http_error(StatusCode::SERVICE_UNAVAILABLE), 1));
        assert!(predicate.should_retry(&http_error(StatusCode::TOO_MANY_REQUESTS), 1));
        assert!(predicate.should_retry(&Error::Timeout, 1));
        assert!(!predicate.should_retry(&http_error(StatusCode::BAD_REQUEST), 1));
        assert!(!predicate.should_retry(&Error::ConfigurationError("bad".to_string()), 1));
    }
}
