//! Token providers wired through the access context

use async_trait::async_trait;
use chrono::Utc;
use logicapps_mcp::api::{AccessContext, ArmClient, Method, ResilienceConfig};
use logicapps_mcp::auth::{CachedToken, CredentialSource, LocalCredentialProvider, TokenProvider};
use logicapps_mcp::cloud::CloudRegistry;
use logicapps_mcp::config::{ConfigSource, Settings};
use logicapps_mcp::error::{AccessError, ErrorKind, format_error};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use wiremock::matchers::{any, header, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FakeSource {
    lifetime: chrono::Duration,
    acquired: AtomicU32,
}

impl FakeSource {
    fn new(lifetime: chrono::Duration) -> Arc<Self> {
        Arc::new(Self {
            lifetime,
            acquired: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl CredentialSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn verify(&self) -> Result<Option<String>, AccessError> {
        Ok(Some("dev@contoso.com".to_string()))
    }

    async fn acquire(&self, audience: &str, _tenant: Option<&str>) -> Result<CachedToken, AccessError> {
        assert!(audience.ends_with('/'));
        let n = self.acquired.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CachedToken::new(format!("local-{}", n), Utc::now() + self.lifetime).with_identity("sub-1"))
    }
}

fn settings_for(server: &MockServer) -> Arc<Settings> {
    let mut cloud = CloudRegistry::new().get("AzurePublic").unwrap().clone();
    cloud.resource_manager = server.uri();
    Arc::new(Settings {
        tenant_id: "tenant-1".to_string(),
        client_id: "client".to_string(),
        cloud,
        default_subscription_id: None,
        log_level: "info".to_string(),
        cache_ttl_seconds: 300,
        config_source: ConfigSource::Absent { path: None },
    })
}

fn local_context(server: &MockServer, source: Arc<FakeSource>) -> AccessContext {
    let settings = settings_for(server);
    let tokens: Arc<dyn TokenProvider> = Arc::new(LocalCredentialProvider::with_source(&settings, source));
    let client = ArmClient::builder(&settings, tokens.clone())
        .resilience(ResilienceConfig::disabled())
        .build()
        .unwrap();
    AccessContext::from_parts(settings, tokens, client)
}

#[tokio::test]
async fn test_long_lived_local_token_reused_across_calls() {
    let server = MockServer::start().await;
    Mock::given(path("/subscriptions"))
        .and(header("authorization", "Bearer local-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(3)
        .mount(&server)
        .await;

    let source = FakeSource::new(chrono::Duration::hours(1));
    let context = local_context(&server, source.clone());
    context.initialize().await.unwrap();

    for _ in 0..3 {
        let _: Value = context
            .client()
            .request(Method::GET, "/subscriptions", None)
            .await
            .unwrap();
    }
    assert_eq!(source.acquired.load(Ordering::SeqCst), 1);

    let status = context.tokens().status().await;
    assert!(status.has_token);
    assert_eq!(status.identity.as_deref(), Some("sub-1"));
}

#[tokio::test]
async fn test_short_lived_local_token_refreshed_per_call() {
    let server = MockServer::start().await;
    Mock::given(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(&server)
        .await;

    // Inside the five minute buffer from the start
    let source = FakeSource::new(chrono::Duration::minutes(4));
    let context = local_context(&server, source.clone());

    for _ in 0..2 {
        context
            .client()
            .request_void(Method::GET, "/subscriptions", None)
            .await
            .unwrap();
    }
    assert_eq!(source.acquired.load(Ordering::SeqCst), 2);

    let sent: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.headers.get("authorization").unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(sent, ["Bearer local-1", "Bearer local-2"]);
}

#[tokio::test]
async fn test_shared_passthrough_token_cleared_after_handler_error() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "AuthorizationFailed", "message": "no access" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let context = AccessContext::passthrough(settings_for(&server)).unwrap();
    let provider = context.passthrough_provider().unwrap();

    let result: Result<Value, AccessError> = provider
        .scoped("caller-token", async {
            context.client().request(Method::GET, "/subscriptions", None).await
        })
        .await;
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArmApiError);
    assert_eq!(err.status(), Some(403));

    // The next request has no token and never reaches the network
    let err = context
        .client()
        .request::<Value>(Method::GET, "/subscriptions", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationError);
}

#[tokio::test]
async fn test_overlapping_requests_on_shared_passthrough_keep_their_tokens() {
    let server = MockServer::start().await;
    Mock::given(path("/subscriptions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "value": [] }))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let context = AccessContext::passthrough(settings_for(&server)).unwrap();
    let call = |token: &'static str| {
        let context = context.clone();
        tokio::spawn(async move {
            let provider = context.passthrough_provider().unwrap();
            provider
                .scoped(token, async {
                    let before = context.tokens().get_access_token().await?;
                    context
                        .client()
                        .request_void(Method::GET, "/subscriptions", None)
                        .await?;
                    let after = context.tokens().get_access_token().await?;
                    Ok::<_, AccessError>((before, after))
                })
                .await
        })
    };

    let first = call("token-a");
    // Let the first request reach the slow response before the second arrives
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = call("token-b");

    let (before, after) = first.await.unwrap().unwrap();
    assert_eq!((before.as_str(), after.as_str()), ("token-a", "token-a"));
    let (before, after) = second.await.unwrap().unwrap();
    assert_eq!((before.as_str(), after.as_str()), ("token-b", "token-b"));

    let sent: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.headers.get("authorization").unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(sent, ["Bearer token-a", "Bearer token-b"]);
    assert!(!context.passthrough_provider().unwrap().has_token());
}

#[tokio::test]
async fn test_format_error_through_anyhow_context() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": { "code": "Conflict", "message": "workflow is being updated" }
        })))
        .mount(&server)
        .await;

    let context = AccessContext::for_request(settings_for(&server), "Bearer caller").unwrap();
    let result: anyhow::Result<Value> = async {
        let value = context
            .client()
            .request(Method::PUT, "/workflows/wf", Some(&json!({ "properties": {} })))
            .await?;
        Ok::<Value, anyhow::Error>(value)
    }
    .await;

    let error = result.unwrap_err().context("updating workflow wf");
    let formatted = format_error(&error);
    assert_eq!(formatted.kind, ErrorKind::ArmApiError);
    let details = formatted.details.unwrap();
    assert_eq!(details["status"], 409);
    assert_eq!(details["code"], "Conflict");
}
