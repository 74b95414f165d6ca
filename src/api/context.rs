//! Explicit access context handed to tool handlers
//!
//! Built once per process (local credential, shared passthrough) or once per
//! inbound request ([`AccessContext::for_request`]). Handlers receive it by
//! reference instead of reaching for global state.

use super::client::ArmClient;
use crate::auth::{LocalCredentialProvider, PassthroughTokenProvider, TokenProvider, bearer_from_header};
use crate::config::Settings;
use crate::error::AccessError;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AccessContext {
    settings: Arc<Settings>,
    tokens: Arc<dyn TokenProvider>,
    client: ArmClient,
    passthrough: Option<Arc<PassthroughTokenProvider>>,
}

impl AccessContext {
    /// Host-credential context for single-user local deployments
    pub fn local(settings: Arc<Settings>) -> Result<Self, AccessError> {
        let provider = LocalCredentialProvider::from_settings(&settings);
        Self::with_provider(settings, Arc::new(provider))
    }

    /// Shared passthrough context; run each caller's request through
    /// [`PassthroughTokenProvider::scoped`], which admits one request at a time
    pub fn passthrough(settings: Arc<Settings>) -> Result<Self, AccessError> {
        let provider = Arc::new(PassthroughTokenProvider::new());
        let mut context = Self::with_provider(settings, provider.clone())?;
        context.passthrough = Some(provider);
        Ok(context)
    }

    /// Isolated context holding only this caller's token
    ///
    /// Accepts a bare token or an `Authorization` header value.
    pub fn for_request(settings: Arc<Settings>, token: &str) -> Result<Self, AccessError> {
        let token = if token.trim_start().to_ascii_lowercase().starts_with("bearer ") {
            bearer_from_header(token)?
        } else {
            token.to_string()
        };
        let provider = Arc::new(PassthroughTokenProvider::with_token(token)?);
        let mut context = Self::with_provider(settings, provider.clone())?;
        context.passthrough = Some(provider);
        Ok(context)
    }

    pub fn with_provider(settings: Arc<Settings>, tokens: Arc<dyn TokenProvider>) -> Result<Self, AccessError> {
        let client = ArmClient::new(&settings, tokens.clone())?;
        Ok(Self::from_parts(settings, tokens, client))
    }

    /// Assemble a context around a custom-built client
    pub fn from_parts(settings: Arc<Settings>, tokens: Arc<dyn TokenProvider>, client: ArmClient) -> Self {
        Self {
            settings,
            tokens,
            client,
            passthrough: None,
        }
    }

    pub async fn initialize(&self) -> Result<(), AccessError> {
        self.tokens.initialize().await
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tokens(&self) -> &Arc<dyn TokenProvider> {
        &self.tokens
    }

    pub fn client(&self) -> &ArmClient {
        &self.client
    }

    /// The passthrough provider, when this context relays caller tokens
    pub fn passthrough_provider(&self) -> Option<&PassthroughTokenProvider> {
        self.passthrough.as_deref()
    }

    /// Subscription for a tool call: explicit, else the configured default
    pub fn subscription(&self, explicit: Option<&str>) -> Result<String, AccessError> {
        self.settings.subscription_or(explicit)
    }
}
