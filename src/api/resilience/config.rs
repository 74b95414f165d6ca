//! Resilience configuration with builder pattern
//!
//! One value for retry, per-attempt timeouts, the pagination cap and request
//! logging, with sane defaults.

use super::retry::RetryConfig;
use crate::config::Settings;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on pages followed by one paginated fetch
pub const DEFAULT_MAX_PAGES: usize = 100;

/// Global resilience configuration for API operations
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub timeouts: TimeoutConfig,
    pub monitoring: MonitoringConfig,
    pub max_pages: usize,
}

/// Timeouts applied to each individual HTTP attempt
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub request: Duration,
    pub connect: Duration,
}

/// Monitoring and logging configuration
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub correlation_ids: bool,
    pub request_logging: bool,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
            monitoring: MonitoringConfig::default(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            connect: Duration::from_secs(10),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            correlation_ids: true,
            request_logging: true,
            log_level: LogLevel::Info,
        }
    }
}

impl ResilienceConfig {
    /// Create a new builder for ResilienceConfig
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Defaults with the request-log level taken from settings
    pub fn from_settings(settings: &Settings) -> Self {
        let mut config = Self::default();
        if let Ok(level) = settings.log_level.parse() {
            config.monitoring.log_level = level;
        }
        config
    }

    /// Conservative config for production environments
    pub fn conservative() -> Self {
        Self {
            retry: RetryConfig::conservative(),
            timeouts: TimeoutConfig::default(),
            monitoring: MonitoringConfig {
                correlation_ids: true,
                request_logging: true,
                log_level: LogLevel::Warn, // Less verbose in production
            },
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Disable retries and request logging (for testing)
    pub fn disabled() -> Self {
        Self {
            retry: RetryConfig::none(),
            timeouts: TimeoutConfig::default(),
            monitoring: MonitoringConfig {
                correlation_ids: false,
                request_logging: false,
                log_level: LogLevel::Error,
            },
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Builder for ResilienceConfig
#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    /// Configure retry behavior
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set total attempts per request
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.retry.max_delay = delay;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.retry.jitter = enabled;
        self
    }

    /// Per-attempt request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.request = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.connect = timeout;
        self
    }

    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.max_pages = pages;
        self
    }

    /// Configure monitoring
    pub fn monitoring_config(mut self, monitoring: MonitoringConfig) -> Self {
        self.config.monitoring = monitoring;
        self
    }

    /// Enable/disable correlation IDs
    pub fn correlation_ids(mut self, enabled: bool) -> Self {
        self.config.monitoring.correlation_ids = enabled;
        self
    }

    /// Enable/disable request logging
    pub fn request_logging(mut self, enabled: bool) -> Self {
        self.config.monitoring.request_logging = enabled;
        self
    }

    /// Set logging level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.monitoring.log_level = level;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
