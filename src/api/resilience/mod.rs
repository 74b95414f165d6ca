//! Retry, timeouts and request logging for ARM calls

pub mod config;
pub mod logging;
pub mod retry;

pub use config::{LogLevel, MonitoringConfig, ResilienceConfig, ResilienceConfigBuilder, TimeoutConfig};
pub use logging::{ApiLogger, OperationContext};
pub use retry::{AttemptError, RetryConfig, RetryOutcome, RetryPolicy, RetryableError, is_idempotent};
