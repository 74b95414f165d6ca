//! Error taxonomy for the Azure access layer
//!
//! Every failure the access layer detects becomes an [`AccessError`]. The tool
//! layer never sees raw transport errors: [`format_error`] turns anything
//! (typed or not) into the stable [`FormattedError`] shape.
//!
//! Error messages never include bearer tokens. Raw ARM response bodies are kept
//! for diagnostics; ARM does not echo credentials back in error payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Closed set of error kinds surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    AuthenticationError,
    ConfigurationError,
    ValidationError,
    ArmApiError,
    RateLimitError,
    ProtocolError,
    UnknownError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::AuthenticationError,
        ErrorKind::ConfigurationError,
        ErrorKind::ValidationError,
        ErrorKind::ArmApiError,
        ErrorKind::RateLimitError,
        ErrorKind::ProtocolError,
        ErrorKind::UnknownError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticationError => "AuthenticationError",
            ErrorKind::ConfigurationError => "ConfigurationError",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::ArmApiError => "ArmApiError",
            ErrorKind::RateLimitError => "RateLimitError",
            ErrorKind::ProtocolError => "ProtocolError",
            ErrorKind::UnknownError => "UnknownError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure produced by the access layer
#[derive(Debug, Clone, Error)]
pub enum AccessError {
    /// No credential, or the credential was rejected or has expired
    #[error("{message}")]
    Authentication {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    /// Unknown cloud name or malformed custom cloud
    #[error("{message}")]
    Configuration { message: String },

    /// Caller supplied an invalid or missing parameter (detected before any network call)
    #[error("{message}")]
    Validation { message: String },

    /// Non-2xx response from Azure
    #[error("Azure request failed with status {status}: {message}")]
    ArmApi {
        status: u16,
        code: Option<String>,
        message: String,
        body: String,
    },

    /// HTTP 429 after the retry budget was spent
    #[error("Azure throttled the request: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
        body: String,
    },

    /// Malformed or runaway pagination, unexpected payload shape
    #[error("{message}")]
    Protocol { message: String },

    #[error("{message}")]
    Unknown { message: String },
}

impl AccessError {
    pub fn authentication(message: impl Into<String>) -> Self {
        AccessError::Authentication {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        AccessError::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AccessError::Validation {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        AccessError::Protocol {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        AccessError::Unknown {
            message: message.into(),
        }
    }

    /// Map a non-success HTTP response into the taxonomy
    ///
    /// 401 means the token was rejected, 429 is throttling, everything else is
    /// an ARM API error carrying the status and body.
    pub fn from_status(status: u16, body: String, retry_after: Option<Duration>) -> Self {
        let parsed = ArmErrorBody::parse(&body);

        match status {
            401 => AccessError::Authentication {
                message: match &parsed {
                    Some(err) => format!(
                        "Azure rejected the access token ({}). Re-authenticate and retry.",
                        err.describe()
                    ),
                    None => "Azure rejected the access token. Re-authenticate and retry.".to_string(),
                },
                status: Some(status),
                body: Some(body),
            },
            429 => AccessError::RateLimit {
                message: parsed
                    .as_ref()
                    .map(ArmErrorBody::describe)
                    .unwrap_or_else(|| "too many requests".to_string()),
                retry_after,
                body,
            },
            _ => {
                let (code, message) = match parsed {
                    Some(err) => (err.code.clone(), err.describe()),
                    None if body.trim().is_empty() => (None, default_status_message(status)),
                    None => (None, truncate(&body, 500)),
                };
                AccessError::ArmApi {
                    status,
                    code,
                    message,
                    body,
                }
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::Authentication { .. } => ErrorKind::AuthenticationError,
            AccessError::Configuration { .. } => ErrorKind::ConfigurationError,
            AccessError::Validation { .. } => ErrorKind::ValidationError,
            AccessError::ArmApi { .. } => ErrorKind::ArmApiError,
            AccessError::RateLimit { .. } => ErrorKind::RateLimitError,
            AccessError::Protocol { .. } => ErrorKind::ProtocolError,
            AccessError::Unknown { .. } => ErrorKind::UnknownError,
        }
    }

    /// Upstream HTTP status, when the failure came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            AccessError::Authentication { status, .. } => *status,
            AccessError::ArmApi { status, .. } => Some(*status),
            AccessError::RateLimit { .. } => Some(429),
            _ => None,
        }
    }

    /// Raw upstream body, when one was received
    pub fn body(&self) -> Option<&str> {
        match self {
            AccessError::Authentication { body, .. } => body.as_deref(),
            AccessError::ArmApi { body, .. } | AccessError::RateLimit { body, .. } => Some(body),
            _ => None,
        }
    }

    fn details(&self) -> Option<Value> {
        let mut details = serde_json::Map::new();
        if let Some(status) = self.status() {
            details.insert("status".to_string(), json!(status));
        }
        if let AccessError::ArmApi {
            code: Some(code), ..
        } = self
        {
            details.insert("code".to_string(), json!(code));
        }
        if let AccessError::RateLimit {
            retry_after: Some(delay),
            ..
        } = self
        {
            details.insert("retryAfterSeconds".to_string(), json!(delay.as_secs()));
        }
        if let Some(body) = self.body().filter(|b| !b.is_empty()) {
            let value = serde_json::from_str::<Value>(body).unwrap_or_else(|_| json!(body));
            details.insert("body".to_string(), value);
        }

        if details.is_empty() {
            None
        } else {
            Some(Value::Object(details))
        }
    }
}

/// ARM error envelope: `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Clone, Deserialize)]
struct ArmErrorEnvelope {
    error: ArmErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
struct ArmErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl ArmErrorBody {
    fn parse(body: &str) -> Option<Self> {
        serde_json::from_str::<ArmErrorEnvelope>(body)
            .ok()
            .map(|envelope| envelope.error)
            .filter(|err| err.code.is_some() || err.message.is_some())
    }

    fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{}: {}", code, message),
            (Some(code), None) => code.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

fn default_status_message(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unexpected status")
        .to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

/// Stable external error shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&AccessError> for FormattedError {
    fn from(error: &AccessError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            details: error.details(),
        }
    }
}

impl From<AccessError> for FormattedError {
    fn from(error: AccessError) -> Self {
        FormattedError::from(&error)
    }
}

/// Normalize any error into a [`FormattedError`]
///
/// Typed errors keep their kind; transport and JSON errors found anywhere in
/// the chain are classified; anything else becomes `UnknownError`.
pub fn format_error(error: &anyhow::Error) -> FormattedError {
    for cause in error.chain() {
        if let Some(access) = cause.downcast_ref::<AccessError>() {
            return FormattedError::from(access);
        }
        if let Some(transport) = cause.downcast_ref::<reqwest::Error>() {
            return format_transport_error(transport);
        }
        if let Some(json_error) = cause.downcast_ref::<serde_json::Error>() {
            return FormattedError {
                kind: ErrorKind::ProtocolError,
                message: format!("Unexpected payload: {}", json_error),
                details: None,
            };
        }
    }

    FormattedError {
        kind: ErrorKind::UnknownError,
        message: format!("{:#}", error),
        details: None,
    }
}

fn format_transport_error(error: &reqwest::Error) -> FormattedError {
    if error.is_decode() {
        return FormattedError {
            kind: ErrorKind::ProtocolError,
            message: format!("Failed to decode response: {}", error),
            details: None,
        };
    }

    let reason = if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connect"
    } else {
        "transport"
    };

    let mut details = serde_json::Map::new();
    details.insert("transport".to_string(), json!(reason));
    if let Some(url) = error.url() {
        details.insert("url".to_string(), json!(url.as_str()));
    }
    if let Some(status) = error.status() {
        details.insert("status".to_string(), json!(status.as_u16()));
    }

    FormattedError {
        kind: ErrorKind::UnknownError,
        message: format!("HTTP transport failure: {}", error),
        details: Some(Value::Object(details)),
    }
}
