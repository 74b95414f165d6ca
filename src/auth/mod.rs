//! Access token providers
//!
//! Two trust models share one contract so the ARM client never branches on
//! which is active:
//!
//! - [`PassthroughTokenProvider`]: relays a caller-supplied bearer token for
//!   the duration of one request
//! - [`LocalCredentialProvider`]: acquires tokens from a credential available
//!   on the host (the Azure CLI login by default), caches and refreshes them

pub mod azure_cli;
pub mod local;
pub mod passthrough;

pub use azure_cli::{AzureCliCredential, CredentialSource};
pub use local::{LocalCredentialProvider, REFRESH_BUFFER};
pub use passthrough::{PassthroughGuard, PassthroughTokenProvider, bearer_from_header};

use crate::error::AccessError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Which trust model a provider implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMode {
    Passthrough,
    LocalCredential,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Passthrough => f.write_str("passthrough"),
            AuthMode::LocalCredential => f.write_str("local-credential"),
        }
    }
}

/// Common contract of both token providers
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Fail fast when authentication is structurally impossible
    async fn initialize(&self) -> Result<(), AccessError>;

    /// Bearer token valid for at least the refresh buffer
    async fn get_access_token(&self) -> Result<String, AccessError>;

    /// Discard any cached credential material
    async fn clear(&self);

    /// Diagnostics without the token itself
    async fn status(&self) -> TokenStatus;

    fn mode(&self) -> AuthMode;
}

impl fmt::Debug for dyn TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenProvider({})", self.mode())
    }
}

/// Snapshot of a provider's cache for diagnostics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub mode: AuthMode,
    pub has_token: bool,
    pub identity: Option<String>,
    pub expires_on: Option<DateTime<Utc>>,
}

/// A token plus its absolute expiry
///
/// Replaced wholesale on refresh. `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_on: DateTime<Utc>,
    /// Label for diagnostics, e.g. the active subscription
    pub identity: Option<String>,
}

impl CachedToken {
    pub fn new(access_token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_on,
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.expires_on - now
    }

    /// True when the remaining lifetime strictly exceeds `buffer`
    pub fn is_fresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        let buffer = chrono::Duration::from_std(buffer).unwrap_or(chrono::Duration::MAX);
        self.remaining(now) > buffer
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .field("identity", &self.identity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_boundary() {
        let now = Utc::now();
        let buffer = Duration::from_secs(300);

        let token = CachedToken::new("t", now + chrono::Duration::seconds(301));
        assert!(token.is_fresh(now, buffer));

        let token = CachedToken::new("t", now + chrono::Duration::seconds(300));
        assert!(!token.is_fresh(now, buffer));

        let token = CachedToken::new("t", now - chrono::Duration::seconds(1));
        assert!(!token.is_fresh(now, buffer));
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = CachedToken::new("super-secret", Utc::now()).with_identity("sub-1");
        let printed = format!("{:?}", token);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("sub-1"));
    }
}
