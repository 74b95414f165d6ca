//! Host-credential token provider with proactive refresh
//!
//! One [`CachedToken`] scoped to the configured audience. A cached token is
//! reused while more than [`REFRESH_BUFFER`] of its lifetime remains; otherwise
//! a replacement is acquired before returning. Concurrent callers that see an
//! expiring token may each refresh: the outcome is the same and the cost is an
//! extra token request, so refreshes are not coordinated.

use super::{AuthMode, AzureCliCredential, CachedToken, CredentialSource, TokenProvider, TokenStatus};
use crate::config::{DEFAULT_TENANT_ID, Settings};
use crate::error::AccessError;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Minimum remaining lifetime for a cached token to be reused
pub const REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);

pub struct LocalCredentialProvider {
    source: Arc<dyn CredentialSource>,
    audience: String,
    tenant_id: Option<String>,
    cache: RwLock<Option<CachedToken>>,
}

impl LocalCredentialProvider {
    pub fn new(source: Arc<dyn CredentialSource>, audience: impl Into<String>) -> Self {
        Self {
            source,
            audience: audience.into(),
            tenant_id: None,
            cache: RwLock::new(None),
        }
    }

    /// Azure CLI credential scoped to the settings' cloud audience and tenant
    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_source(settings, Arc::new(AzureCliCredential::new()))
    }

    pub fn with_source(settings: &Settings, source: Arc<dyn CredentialSource>) -> Self {
        // "common" is the multi-tenant default; let the CLI use its active tenant
        let tenant_id = Some(settings.tenant_id.clone()).filter(|t| t != DEFAULT_TENANT_ID);
        Self {
            tenant_id,
            ..Self::new(source, settings.cloud.authentication.token_audience.clone())
        }
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    async fn refresh(&self) -> Result<CachedToken, AccessError> {
        debug!(
            "Acquiring token for {} from {}",
            self.audience,
            self.source.name()
        );
        let token = self
            .source
            .acquire(&self.audience, self.tenant_id.as_deref())
            .await?;

        if !token.is_fresh(Utc::now(), REFRESH_BUFFER) {
            debug!("Freshly acquired token already inside the refresh buffer");
        }

        *self.cache.write().await = Some(token.clone());
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for LocalCredentialProvider {
    async fn initialize(&self) -> Result<(), AccessError> {
        if self.audience.trim().is_empty() {
            return Err(AccessError::authentication(
                "No token audience configured for the selected cloud; cannot request tokens",
            ));
        }

        let identity = self.source.verify().await?;
        let token = self.refresh().await?;
        info!(
            "Authenticated via {} as {} (token expires {})",
            self.source.name(),
            identity
                .or_else(|| token.identity.clone())
                .unwrap_or_else(|| "unknown identity".to_string()),
            token.expires_on.to_rfc3339()
        );
        Ok(())
    }

    async fn get_access_token(&self) -> Result<String, AccessError> {
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.as_ref() {
                if token.is_fresh(Utc::now(), REFRESH_BUFFER) {
                    return Ok(token.access_token.clone());
                }
                debug!(
                    "Cached token expires {}; refreshing",
                    token.expires_on.to_rfc3339()
                );
            }
        }

        Ok(self.refresh().await?.access_token)
    }

    async fn clear(&self) {
        *self.cache.write().await = None;
        debug!("Local credential cache cleared");
    }

    async fn status(&self) -> TokenStatus {
        let cache = self.cache.read().await;
        TokenStatus {
            mode: AuthMode::LocalCredential,
            has_token: cache.is_some(),
            identity: cache.as_ref().and_then(|t| t.identity.clone()),
            expires_on: cache.as_ref().map(|t| t.expires_on),
        }
    }

    fn mode(&self) -> AuthMode {
        AuthMode::LocalCredential
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Hands out numbered tokens with a fixed lifetime
    struct CountingSource {
        lifetime: chrono::Duration,
        acquired: AtomicU32,
    }

    impl CountingSource {
        fn new(lifetime: chrono::Duration) -> Arc<Self> {
            Arc::new(Self {
                lifetime,
                acquired: AtomicU32::new(0),
            })
        }

        fn count(&self) -> u32 {
            self.acquired.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn verify(&self) -> Result<Option<String>, AccessError> {
            Ok(Some("tester".to_string()))
        }

        async fn acquire(&self, _audience: &str, _tenant: Option<&str>) -> Result<CachedToken, AccessError> {
            let n = self.acquired.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(CachedToken::new(format!("token-{}", n), Utc::now() + self.lifetime))
        }
    }

    #[tokio::test]
    async fn test_fresh_token_is_reused() {
        let source = CountingSource::new(chrono::Duration::hours(1));
        let provider = LocalCredentialProvider::new(source.clone(), "https://management.azure.com/");

        provider.initialize().await.unwrap();
        assert_eq!(source.count(), 1);

        for _ in 0..5 {
            assert_eq!(provider.get_access_token().await.unwrap(), "token-1");
        }
        assert_eq!(source.count(), 1);
    }

    #[tokio::test]
    async fn test_expiring_token_refreshed_once() {
        let source = CountingSource::new(chrono::Duration::hours(1));
        let provider = LocalCredentialProvider::new(source.clone(), "aud");

        // Seed a token with four minutes left
        *provider.cache.write().await = Some(CachedToken::new(
            "stale",
            Utc::now() + chrono::Duration::minutes(4),
        ));

        assert_eq!(provider.get_access_token().await.unwrap(), "token-1");
        assert_eq!(source.count(), 1);
        assert_eq!(provider.get_access_token().await.unwrap(), "token-1");
        assert_eq!(source.count(), 1);
    }

    #[tokio::test]
    async fn test_lazy_acquisition_without_initialize() {
        let source = CountingSource::new(chrono::Duration::hours(1));
        let provider = LocalCredentialProvider::new(source.clone(), "aud");

        assert_eq!(provider.get_access_token().await.unwrap(), "token-1");
        assert_eq!(source.count(), 1);
    }

    #[tokio::test]
    async fn test_clear_forces_new_acquisition() {
        let source = CountingSource::new(chrono::Duration::hours(1));
        let provider = LocalCredentialProvider::new(source.clone(), "aud");

        provider.get_access_token().await.unwrap();
        provider.clear().await;
        assert!(!provider.status().await.has_token);
        assert_eq!(provider.get_access_token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn test_empty_audience_fails_fast() {
        let source = CountingSource::new(chrono::Duration::hours(1));
        let provider = LocalCredentialProvider::new(source.clone(), "  ");

        let err = provider.initialize().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
        assert_eq!(source.count(), 0);
    }
}
