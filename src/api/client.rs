//! Authenticated HTTP client for ARM and the Standard workflow runtime
//!
//! Control-plane calls go to the cloud's resource manager host; workflow
//! runtime calls go to the per-app host (`https://<app><websites suffix>`).
//! Both use the same token provider, retry policy and error mapping.

use super::constants::{self, headers};
use super::models::ArmPage;
use super::resilience::{
    ApiLogger, AttemptError, OperationContext, ResilienceConfig, RetryPolicy, RetryableError, is_idempotent,
    retry::parse_retry_after,
};
use crate::auth::TokenProvider;
use crate::config::Settings;
use crate::error::AccessError;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which host a request is addressed to
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    ResourceManager,
    WorkflowRuntime { app: &'a str },
}

/// ARM request client with retry, pagination and typed errors
#[derive(Clone)]
pub struct ArmClient {
    http_client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    resource_manager: Url,
    websites_suffix: String,
    workflow_base_override: Option<Url>,
    retry_policy: RetryPolicy,
    api_logger: ApiLogger,
    max_pages: usize,
}

impl std::fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmClient")
            .field("resource_manager", &self.resource_manager.as_str())
            .field("websites_suffix", &self.websites_suffix)
            .field("auth_mode", &self.tokens.mode())
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

/// Builder for [`ArmClient`]
pub struct ArmClientBuilder {
    tokens: Arc<dyn TokenProvider>,
    resource_manager: String,
    websites_suffix: String,
    workflow_base_override: Option<String>,
    resilience: ResilienceConfig,
    http_client: Option<reqwest::Client>,
}

impl ArmClientBuilder {
    pub fn resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.resilience = resilience;
        self
    }

    /// Target a different resource manager host
    pub fn resource_manager_url(mut self, url: impl Into<String>) -> Self {
        self.resource_manager = url.into();
        self
    }

    /// Send every workflow runtime call to one fixed host, whatever the app
    pub fn workflow_base_url(mut self, url: impl Into<String>) -> Self {
        self.workflow_base_override = Some(url.into());
        self
    }

    /// Use a preconfigured HTTP client; resilience timeouts are then not applied
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> Result<ArmClient, AccessError> {
        let resource_manager = parse_base(&self.resource_manager, "resource manager")?;
        let workflow_base_override = self
            .workflow_base_override
            .as_deref()
            .map(|url| parse_base(url, "workflow runtime"))
            .transpose()?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .pool_max_idle_per_host(10)
                .pool_idle_timeout(Duration::from_secs(90))
                .timeout(self.resilience.timeouts.request)
                .connect_timeout(self.resilience.timeouts.connect)
                .user_agent(constants::USER_AGENT)
                .build()
                .map_err(|e| AccessError::configuration(format!("Failed to build HTTP client: {}", e)))?,
        };

        Ok(ArmClient {
            http_client,
            tokens: self.tokens,
            resource_manager,
            websites_suffix: self.websites_suffix,
            workflow_base_override,
            retry_policy: RetryPolicy::new(self.resilience.retry.clone()),
            api_logger: ApiLogger::new(self.resilience.monitoring.clone()),
            max_pages: self.resilience.max_pages.max(1),
        })
    }
}

impl ArmClient {
    pub fn builder(settings: &Settings, tokens: Arc<dyn TokenProvider>) -> ArmClientBuilder {
        ArmClientBuilder {
            tokens,
            resource_manager: settings.cloud.resource_manager_base().to_string(),
            websites_suffix: settings.cloud.suffixes.azure_websites.clone(),
            workflow_base_override: None,
            resilience: ResilienceConfig::from_settings(settings),
            http_client: None,
        }
    }

    /// Client with default resilience for the settings' cloud
    pub fn new(settings: &Settings, tokens: Arc<dyn TokenProvider>) -> Result<Self, AccessError> {
        Self::builder(settings, tokens).build()
    }

    pub fn tokens(&self) -> &Arc<dyn TokenProvider> {
        &self.tokens
    }

    pub fn resource_manager(&self) -> &str {
        self.resource_manager.as_str().trim_end_matches('/')
    }

    /// Control-plane call returning a JSON body
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, AccessError> {
        let url = self.resolve(Target::ResourceManager, path)?;
        let token = self.tokens.get_access_token().await?;
        let text = self.send(&method, &url, body, &token).await?;
        decode(&text)
    }

    /// Control-plane list call, following `nextLink` until exhausted
    pub async fn request_all_pages<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<Vec<T>, AccessError> {
        let url = self.resolve(Target::ResourceManager, path)?;
        self.drain_pages(method, url).await
    }

    /// Control-plane call whose response body is discarded
    pub async fn request_void(&self, method: Method, path: &str, body: Option<&Value>) -> Result<(), AccessError> {
        let url = self.resolve(Target::ResourceManager, path)?;
        let token = self.tokens.get_access_token().await?;
        self.send(&method, &url, body, &token).await.map(|_| ())
    }

    /// Workflow runtime call against a Standard app's own host
    pub async fn workflow_request<T: DeserializeOwned>(
        &self,
        app: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, AccessError> {
        let url = self.resolve(Target::WorkflowRuntime { app }, path)?;
        let token = self.tokens.get_access_token().await?;
        let text = self.send(&method, &url, body, &token).await?;
        decode(&text)
    }

    pub async fn workflow_request_all_pages<T: DeserializeOwned>(
        &self,
        app: &str,
        method: Method,
        path: &str,
    ) -> Result<Vec<T>, AccessError> {
        let url = self.resolve(Target::WorkflowRuntime { app }, path)?;
        self.drain_pages(method, url).await
    }

    pub async fn workflow_request_void(
        &self,
        app: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(), AccessError> {
        let url = self.resolve(Target::WorkflowRuntime { app }, path)?;
        let token = self.tokens.get_access_token().await?;
        self.send(&method, &url, body, &token).await.map(|_| ())
    }

    /// Fetch every page starting at `first`, in response order
    ///
    /// One token and one correlation id serve the whole fetch. Follow-up
    /// pages are fetched with GET and must stay on the first page's host.
    async fn drain_pages<T: DeserializeOwned>(&self, method: Method, first: Url) -> Result<Vec<T>, AccessError> {
        let token = self.tokens.get_access_token().await?;
        let context = self.start_operation(&method, &first);
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(first.clone());
        let mut method = method;
        let mut pages = 0;

        while let Some(url) = next.take() {
            if !visited.insert(url.to_string()) {
                return Err(AccessError::protocol(format!(
                    "Pagination cycle: nextLink {} was already fetched",
                    url
                )));
            }
            if pages >= self.max_pages {
                return Err(AccessError::protocol(format!(
                    "Pagination exceeded {} pages; the server may be returning a nextLink cycle",
                    self.max_pages
                )));
            }

            let text = self.send_in(&context, &method, &url, None, &token).await?;
            if text.trim().is_empty() {
                return Err(AccessError::protocol(format!(
                    "Empty response body for list page {} ({})",
                    pages + 1,
                    url
                )));
            }
            let page: ArmPage<T> = serde_json::from_str(&text).map_err(|e| {
                AccessError::protocol(format!("Unexpected list page shape from {}: {}", url, e))
            })?;
            pages += 1;

            next = page.next().map(|link| follow_link(&first, link)).transpose()?;
            self.api_logger.log_page(&context, pages, page.value.len(), next.is_some());
            items.extend(page.value);
            method = Method::GET;
        }

        Ok(items)
    }

    fn start_operation(&self, method: &Method, url: &Url) -> OperationContext {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        self.api_logger
            .start_operation(method.as_str(), url.path(), &correlation_id)
    }

    /// Issue one logical call with retries; returns the success body text
    async fn send(&self, method: &Method, url: &Url, body: Option<&Value>, token: &str) -> Result<String, AccessError> {
        let context = self.start_operation(method, url);
        self.send_in(&context, method, url, body, token).await
    }

    async fn send_in(
        &self,
        context: &OperationContext,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        token: &str,
    ) -> Result<String, AccessError> {
        let send_correlation = self.api_logger.config().correlation_ids;

        let outcome = self
            .retry_policy
            .execute(is_idempotent(method), |attempt| {
                let method = method.clone();
                let correlation_id = context.correlation_id.as_str();
                async move {
                    let mut builder = self
                        .http_client
                        .request(method, url.clone())
                        .bearer_auth(token)
                        .header(ACCEPT, headers::CONTENT_TYPE_JSON)
                        .header(CONTENT_TYPE, headers::CONTENT_TYPE_JSON);
                    if send_correlation {
                        builder = builder.header(headers::X_CLIENT_REQUEST_ID, correlation_id);
                    }
                    if let Some(body) = body {
                        builder = builder.json(body);
                    }
                    let request = builder.build().map_err(|e| {
                        AttemptError::fatal(AccessError::validation(format!("Invalid request: {}", e)))
                    })?;

                    self.api_logger.log_request(context, attempt, url.as_str(), request.headers());
                    self.attempt(context, attempt, request).await
                }
            })
            .await;

        let failure = outcome.result.as_ref().err().map(ToString::to_string);
        self.api_logger.complete_operation(
            context,
            outcome.attempts,
            match &failure {
                Some(message) => Err(message.as_str()),
                None => Ok(()),
            },
        );

        outcome.result
    }

    async fn attempt(&self, context: &OperationContext, attempt: u32, request: reqwest::Request) -> Result<String, AttemptError> {
        let started = Instant::now();
        let response = match self.http_client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                self.api_logger.log_transport_error(context, attempt, &e.to_string());
                return Err(transport_failure(e));
            }
        };

        let status = response.status().as_u16();
        self.api_logger.log_response(context, attempt, status, started.elapsed());
        let retry_after = parse_retry_after(response.headers().get(headers::RETRY_AFTER));

        let text = response.text().await.map_err(transport_failure)?;
        if (200..300).contains(&status) {
            return Ok(text);
        }

        Err(AttemptError {
            class: RetryableError::from_status_code(status),
            error: AccessError::from_status(status, text, retry_after),
            retry_after,
        })
    }

    /// Validate `path` and join it onto the target's base URL
    fn resolve(&self, target: Target<'_>, path: &str) -> Result<Url, AccessError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(AccessError::validation("Request path must not be empty"));
        }

        let base = match target {
            Target::ResourceManager => self.resource_manager.clone(),
            Target::WorkflowRuntime { app } => self.workflow_base(app)?,
        };

        if path.starts_with("https://") || path.starts_with("http://") {
            let url = Url::parse(path)
                .map_err(|e| AccessError::validation(format!("Invalid request URL '{}': {}", path, e)))?;
            if !same_origin(&url, &base) {
                return Err(AccessError::validation(format!(
                    "Absolute request URL must stay on {}",
                    origin_label(&base)
                )));
            }
            return Ok(url);
        }

        if !path.starts_with('/') {
            return Err(AccessError::validation(format!(
                "Request path '{}' must start with '/'",
                path
            )));
        }

        join(&base, path)
    }

    fn workflow_base(&self, app: &str) -> Result<Url, AccessError> {
        validate_app_name(app)?;
        if let Some(base) = &self.workflow_base_override {
            return Ok(base.clone());
        }

        let url = constants::workflow_base_url(app, &self.websites_suffix);
        Url::parse(&url).map_err(|e| {
            AccessError::configuration(format!("Cannot build workflow runtime host '{}': {}", url, e))
        })
    }
}

/// A Standard app name must be usable as a DNS label
pub fn validate_app_name(app: &str) -> Result<(), AccessError> {
    let valid = !app.is_empty()
        && app.len() <= 63
        && !app.starts_with('-')
        && !app.ends_with('-')
        && app.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

    if valid {
        Ok(())
    } else {
        Err(AccessError::validation(format!(
            "Invalid Logic App name '{}': use 1-63 letters, digits or hyphens, not starting or ending with a hyphen",
            app
        )))
    }
}

fn parse_base(raw: &str, label: &str) -> Result<Url, AccessError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AccessError::configuration(format!("Invalid {} URL '{}': {}", label, raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AccessError::configuration(format!(
            "Invalid {} URL '{}': expected an http(s) host",
            label, raw
        )));
    }
    Ok(url)
}

/// Append an absolute path (with query) to a base URL, keeping any base path prefix
fn join(base: &Url, path: &str) -> Result<Url, AccessError> {
    let prefix = base.as_str().trim_end_matches('/');
    Url::parse(&format!("{}{}", prefix, path))
        .map_err(|e| AccessError::validation(format!("Invalid request path '{}': {}", path, e)))
}

fn follow_link(first: &Url, link: &str) -> Result<Url, AccessError> {
    let url = if link.starts_with('/') {
        first.join(link)
    } else {
        Url::parse(link)
    }
    .map_err(|e| AccessError::protocol(format!("Malformed nextLink '{}': {}", link, e)))?;

    if !same_origin(&url, first) {
        return Err(AccessError::protocol(format!(
            "nextLink leaves {}; refusing to send credentials to {}",
            origin_label(first),
            origin_label(&url)
        )));
    }
    Ok(url)
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

fn origin_label(url: &Url) -> String {
    url.origin().ascii_serialization()
}

fn transport_failure(error: reqwest::Error) -> AttemptError {
    let class = RetryableError::from_reqwest_error(&error);
    let access_error = if error.is_timeout() {
        AccessError::unknown(format!("Request timed out: {}", error))
    } else if error.is_connect() {
        AccessError::unknown(format!("Could not connect: {}", error))
    } else if error.is_decode() || error.is_body() {
        AccessError::protocol(format!("Could not read response body: {}", error))
    } else {
        AccessError::unknown(format!("HTTP transport failure: {}", error))
    };

    AttemptError {
        class,
        error: access_error,
        retry_after: None,
    }
}

/// Decode a success body; an empty body decodes as JSON `null`
fn decode<T: DeserializeOwned>(text: &str) -> Result<T, AccessError> {
    if text.trim().is_empty() {
        return serde_json::from_value(Value::Null).map_err(|_| {
            AccessError::protocol("Empty response body where a JSON document was expected")
        });
    }

    serde_json::from_str(text).map_err(|e| AccessError::protocol(format!("Unexpected response shape: {}", e)))
}
