//! Retry policies with exponential backoff
//!
//! Only a transient class of failures is retried: HTTP 429, 502, 503, 504 and
//! transport-level timeouts or connect failures. Timeouts are retried only for
//! idempotent verbs, because a POST/PATCH that timed out may already have
//! taken effect.

use crate::error::AccessError;
use log::{debug, info, warn};
use rand::Rng;
use reqwest::Method;
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Conservative config for production
    pub fn conservative() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 1.5,
            jitter: true,
        }
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Failure classes and their retry behavior
#[derive(Debug, Clone, PartialEq)]
pub enum RetryableError {
    /// Connection could not be established; the request never reached the server
    Network,
    /// Transport timeout while waiting for the response
    Timeout,
    /// HTTP 429 Too Many Requests
    RateLimited,
    /// HTTP 502, 503, 504
    Transient(u16),
    /// Any other 5xx
    ServerError(u16),
    /// 4xx other than 401 and 429
    ClientError(u16),
    /// HTTP 401
    AuthError,
    Unknown,
}

impl RetryableError {
    /// Determine if this failure should be retried for a verb of the given idempotency
    pub fn should_retry(&self, idempotent: bool) -> bool {
        match self {
            RetryableError::Network => true,
            RetryableError::Timeout => idempotent,
            RetryableError::RateLimited => true,
            RetryableError::Transient(_) => true,
            RetryableError::ServerError(_) => false,
            RetryableError::ClientError(_) => false,
            RetryableError::AuthError => false,
            RetryableError::Unknown => false,
        }
    }

    /// Classify an HTTP status code into retry behavior
    pub fn from_status_code(status: u16) -> Self {
        match status {
            401 => RetryableError::AuthError,
            429 => RetryableError::RateLimited,
            502..=504 => RetryableError::Transient(status),
            400..=499 => RetryableError::ClientError(status),
            500..=599 => RetryableError::ServerError(status),
            _ => RetryableError::Unknown,
        }
    }

    /// Classify a reqwest error
    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            RetryableError::Timeout
        } else if error.is_connect() {
            RetryableError::Network
        } else if let Some(status) = error.status() {
            Self::from_status_code(status.as_u16())
        } else {
            RetryableError::Unknown
        }
    }
}

/// Verbs whose repetition has no additional side effect
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
    )
}

/// One failed attempt, as seen by the retry loop
#[derive(Debug)]
pub struct AttemptError {
    pub class: RetryableError,
    pub error: AccessError,
    /// Server-requested delay (`Retry-After`)
    pub retry_after: Option<Duration>,
}

impl AttemptError {
    /// A failure that is never retried
    pub fn fatal(error: AccessError) -> Self {
        Self {
            class: RetryableError::Unknown,
            error,
            retry_after: None,
        }
    }
}

/// Result of a retried operation plus how many attempts it took
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, AccessError>,
    pub attempts: u32,
}

/// Retry policy that implements exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    ///
    /// `operation` receives the 1-based attempt number.
    pub async fn execute<F, Fut, T>(&self, idempotent: bool, operation: F) -> RetryOutcome<T>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("Operation succeeded after {} attempts", attempt);
                    }
                    return RetryOutcome {
                        result: Ok(result),
                        attempts: attempt,
                    };
                }
                Err(failure) => {
                    let should_retry = failure.class.should_retry(idempotent);

                    if !should_retry || attempt >= max_attempts {
                        if should_retry {
                            warn!(
                                "Operation failed after exhausting {} attempts: {}",
                                attempt, failure.error
                            );
                        } else {
                            debug!(
                                "Operation failed on attempt {} ({:?}, not retryable): {}",
                                attempt, failure.class, failure.error
                            );
                        }
                        return RetryOutcome {
                            result: Err(failure.error),
                            attempts: attempt,
                        };
                    }

                    let delay = self.delay_for(attempt, failure.retry_after);
                    warn!(
                        "Attempt {}/{} failed ({:?}); retrying in {:?}: {}",
                        attempt, max_attempts, failure.class, delay, failure.error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Delay before the next attempt, honoring a server-requested delay
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(requested) => requested.min(self.config.max_delay),
            None => self.calculate_delay(attempt),
        }
    }

    /// Calculate exponential backoff delay with optional jitter
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.config.base_delay.as_millis() as f64)
            * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let mut delay = Duration::from_millis(delay_ms as u64);

        if delay > self.config.max_delay {
            delay = self.config.max_delay;
        }

        // Add jitter to prevent thundering herd
        if self.config.jitter {
            let jitter_factor = rand::rng().random_range(0.5..=1.5);
            let jittered_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
            delay = Duration::from_millis(jittered_ms).min(self.config.max_delay);
        }

        delay
    }
}

/// Parse a `Retry-After` header given in seconds
pub fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
