//! Structured request logging with correlation tracking
//!
//! Every logical call gets one correlation id, sent as
//! `x-ms-client-request-id` on each attempt and stamped on every log line,
//! so a retried request reads as one story in the logs. Header values that
//! carry credentials are never written out.

use super::config::{LogLevel, MonitoringConfig};
use log::{debug, error, info, warn};
use reqwest::header::HeaderMap;
use serde_json::{Map, Value, json};
use std::time::{Duration, Instant};

const REDACTED: &str = "[REDACTED]";

/// Structured logger for API operations with correlation tracking
#[derive(Debug, Clone)]
pub struct ApiLogger {
    config: MonitoringConfig,
}

/// Context for a single API operation with correlation tracking
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub correlation_id: String,
    pub method: String,
    /// Path or URL without query secrets
    pub target: String,
    pub start_time: Instant,
}

impl OperationContext {
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl ApiLogger {
    pub fn new(config: MonitoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    /// Start tracking a new operation
    pub fn start_operation(&self, method: &str, target: &str, correlation_id: &str) -> OperationContext {
        let context = OperationContext {
            correlation_id: correlation_id.to_string(),
            method: method.to_string(),
            target: target.to_string(),
            start_time: Instant::now(),
        };

        if self.config.request_logging && self.should_log(LogLevel::Debug) {
            let log_data = json!({
                "event": "operation_started",
                "correlation_id": context.correlation_id,
                "method": context.method,
                "target": context.target,
            });
            debug!("ARM operation started: {}", log_data);
        }

        context
    }

    /// Log one outgoing attempt
    pub fn log_request(&self, context: &OperationContext, attempt: u32, url: &str, headers: &HeaderMap) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_request",
            "correlation_id": context.correlation_id,
            "attempt": attempt,
            "method": context.method,
            "url": url,
            "headers": sanitize_headers(headers),
        });
        debug!("HTTP request: {}", log_data);
    }

    pub fn log_response(&self, context: &OperationContext, attempt: u32, status: u16, duration: Duration) {
        if !self.config.request_logging {
            return;
        }

        let log_data = json!({
            "event": "http_response",
            "correlation_id": context.correlation_id,
            "attempt": attempt,
            "status_code": status,
            "duration_ms": duration.as_millis(),
        });

        if status >= 400 && self.should_log(LogLevel::Warn) {
            warn!("HTTP response (error): {}", log_data);
        } else if self.should_log(LogLevel::Debug) {
            debug!("HTTP response: {}", log_data);
        }
    }

    /// Log a transport failure that produced no response
    pub fn log_transport_error(&self, context: &OperationContext, attempt: u32, error: &str) {
        if !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "transport_error",
            "correlation_id": context.correlation_id,
            "attempt": attempt,
            "error": error,
        });
        warn!("HTTP transport error: {}", log_data);
    }

    /// Log the end of an operation, successful or not
    pub fn complete_operation(&self, context: &OperationContext, attempts: u32, outcome: Result<(), &str>) {
        if !self.config.request_logging {
            return;
        }

        let log_data = json!({
            "event": "operation_completed",
            "correlation_id": context.correlation_id,
            "method": context.method,
            "target": context.target,
            "attempts": attempts,
            "duration_ms": context.elapsed().as_millis(),
            "success": outcome.is_ok(),
            "error_message": outcome.err(),
        });

        match outcome {
            Ok(()) if self.should_log(LogLevel::Info) => info!("ARM operation completed: {}", log_data),
            Err(_) if self.should_log(LogLevel::Error) => error!("ARM operation failed: {}", log_data),
            _ => {}
        }
    }

    /// Log one page of a paginated fetch
    pub fn log_page(&self, context: &OperationContext, page: usize, items: usize, has_next: bool) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "page_fetched",
            "correlation_id": context.correlation_id,
            "page": page,
            "items": items,
            "has_next": has_next,
        });
        debug!("Page fetched: {}", log_data);
    }

    /// Check if we should log at the given level
    fn should_log(&self, level: LogLevel) -> bool {
        match (self.config.log_level, level) {
            (LogLevel::Error, LogLevel::Error) => true,
            (LogLevel::Warn, LogLevel::Error | LogLevel::Warn) => true,
            (LogLevel::Info, LogLevel::Error | LogLevel::Warn | LogLevel::Info) => true,
            (LogLevel::Debug, LogLevel::Error | LogLevel::Warn | LogLevel::Info | LogLevel::Debug) => true,
            (LogLevel::Trace, _) => true,
            _ => false,
        }
    }
}

/// Header map as JSON with credential-bearing values redacted
pub fn sanitize_headers(headers: &HeaderMap) -> Value {
    let mut sanitized = Map::new();

    for (name, value) in headers {
        let key = name.as_str().to_lowercase();
        let shown = if key.contains("authorization") || key.contains("token") || key.contains("key") {
            REDACTED.to_string()
        } else {
            value.to_str().unwrap_or("<binary>").to_string()
        };
        sanitized.insert(name.as_str().to_string(), Value::String(shown));
    }

    Value::Object(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};

    fn logger(level: LogLevel) -> ApiLogger {
        ApiLogger::new(MonitoringConfig {
            correlation_ids: true,
            request_logging: true,
            log_level: level,
        })
    }

    #[test]
    fn test_operation_context_keeps_correlation_id() {
        let context = logger(LogLevel::Debug).start_operation("GET", "/subscriptions", "corr-123");

        assert_eq!(context.correlation_id, "corr-123");
        assert_eq!(context.method, "GET");
        assert_eq!(context.target, "/subscriptions");
    }

    #[test]
    fn test_bearer_and_key_headers_redacted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret-token"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-functions-key", HeaderValue::from_static("secret-key"));

        let sanitized = sanitize_headers(&headers);

        assert_eq!(sanitized["authorization"], REDACTED);
        assert_eq!(sanitized["content-type"], "application/json");
        assert_eq!(sanitized["x-functions-key"], REDACTED);
        assert!(!sanitized.to_string().contains("secret"));
    }

    #[test]
    fn test_log_level_filtering() {
        let logger = logger(LogLevel::Warn);

        assert!(logger.should_log(LogLevel::Error));
        assert!(logger.should_log(LogLevel::Warn));
        assert!(!logger.should_log(LogLevel::Info));
        assert!(!logger.should_log(LogLevel::Debug));
        assert!(!logger.should_log(LogLevel::Trace));
    }
}
