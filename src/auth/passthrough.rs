//! Caller-supplied bearer tokens
//!
//! The token is registered before tool logic runs and must be cleared when the
//! request finishes, whatever the outcome. [`PassthroughTokenProvider::register`]
//! hands back a guard that clears on drop, so early returns, errors and panics
//! all clear it.
//!
//! A shared provider serves one request at a time: [`PassthroughTokenProvider::scoped`]
//! waits its turn, and registering over a token still in place is refused.

use super::{AuthMode, TokenProvider, TokenStatus};
use crate::error::AccessError;
use async_trait::async_trait;
use log::debug;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Mutex as TurnLock;

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_from_header(value: &str) -> Result<String, AccessError> {
    let value = value.trim();
    let (scheme, token) = value.split_once(' ').ok_or_else(|| {
        AccessError::authentication("Authorization header must use the Bearer scheme")
    })?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AccessError::authentication(
            "Authorization header must use the Bearer scheme",
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AccessError::authentication("Authorization header carries an empty token"));
    }
    Ok(token.to_string())
}

/// Holds at most one in-flight bearer token
#[derive(Default)]
pub struct PassthroughTokenProvider {
    token: Mutex<Option<String>>,
    /// Held by `scoped` for the whole handler
    in_flight: TurnLock<()>,
}

impl std::fmt::Debug for PassthroughTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassthroughTokenProvider")
            .field("has_token", &self.slot().is_some())
            .finish()
    }
}

impl PassthroughTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider pre-loaded with one caller's token, for a per-request context
    pub fn with_token(token: impl Into<String>) -> Result<Self, AccessError> {
        let provider = Self::new();
        provider.set_token(token)?;
        Ok(provider)
    }

    // A poisoned lock still holds a usable Option; clearing must never be skipped
    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a token without a guard; pair with [`Self::clear_passthrough_token`]
    ///
    /// Fails while another caller's token is still registered.
    pub fn set_token(&self, token: impl Into<String>) -> Result<(), AccessError> {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            return Err(AccessError::authentication("Bearer token must not be empty"));
        }

        let mut slot = self.slot();
        if slot.is_some() {
            return Err(AccessError::authentication(
                "Another request's bearer token is still registered; passthrough requests must not overlap",
            ));
        }
        *slot = Some(token.to_string());
        debug!("Passthrough token registered");
        Ok(())
    }

    pub fn clear_passthrough_token(&self) {
        if self.slot().take().is_some() {
            debug!("Passthrough token cleared");
        }
    }

    pub fn has_token(&self) -> bool {
        self.slot().is_some()
    }

    /// Register a token; it is cleared when the returned guard drops
    pub fn register(&self, token: impl Into<String>) -> Result<PassthroughGuard<'_>, AccessError> {
        self.set_token(token)?;
        Ok(PassthroughGuard { provider: self })
    }

    /// Run `handler` with `token` registered, clearing it on every exit path
    ///
    /// Overlapping calls queue in arrival order; the token is cleared before
    /// the next caller's turn starts.
    pub async fn scoped<F, T, E>(&self, token: impl Into<String>, handler: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<AccessError>,
    {
        let _turn = self.in_flight.lock().await;
        let _guard = self.register(token)?;
        handler.await
    }
}

#[async_trait]
impl TokenProvider for PassthroughTokenProvider {
    async fn initialize(&self) -> Result<(), AccessError> {
        // Nothing is acquired locally; tokens arrive per request
        Ok(())
    }

    async fn get_access_token(&self) -> Result<String, AccessError> {
        self.slot().clone().ok_or_else(|| {
            AccessError::authentication(
                "No bearer token registered for this request. Send an Authorization: Bearer <token> header.",
            )
        })
    }

    async fn clear(&self) {
        self.clear_passthrough_token();
    }

    async fn status(&self) -> TokenStatus {
        TokenStatus {
            mode: AuthMode::Passthrough,
            has_token: self.has_token(),
            identity: None,
            expires_on: None,
        }
    }

    fn mode(&self) -> AuthMode {
        AuthMode::Passthrough
    }
}

/// Clears the registered passthrough token when dropped
#[must_use = "the token is cleared as soon as the guard is dropped"]
pub struct PassthroughGuard<'a> {
    provider: &'a PassthroughTokenProvider,
}

impl std::fmt::Debug for PassthroughGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassthroughGuard").finish_non_exhaustive()
    }
}

impl Drop for PassthroughGuard<'_> {
    fn drop(&mut self) {
        self.provider.clear_passthrough_token();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[test]
    fn test_bearer_header_parsing() {
        assert_eq!(bearer_from_header("Bearer abc.def").unwrap(), "abc.def");
        assert_eq!(bearer_from_header("  bearer   xyz ").unwrap(), "xyz");
        assert!(bearer_from_header("Basic dXNlcg==").is_err());
        assert!(bearer_from_header("Bearer").is_err());
        assert!(bearer_from_header("Bearer   ").is_err());
    }

    #[tokio::test]
    async fn test_no_token_is_authentication_error() {
        let provider = PassthroughTokenProvider::new();
        let err = provider.get_access_token().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
    }

    #[tokio::test]
    async fn test_cleared_token_never_returned() {
        let provider = PassthroughTokenProvider::new();
        provider.set_token("caller-a").unwrap();
        assert_eq!(provider.get_access_token().await.unwrap(), "caller-a");

        provider.clear_passthrough_token();
        assert!(provider.get_access_token().await.is_err());
        assert!(!provider.status().await.has_token);
    }

    #[tokio::test]
    async fn test_guard_clears_on_drop() {
        let provider = PassthroughTokenProvider::new();
        {
            let _guard = provider.register("caller-b").unwrap();
            assert_eq!(provider.get_access_token().await.unwrap(), "caller-b");
        }
        assert!(provider.get_access_token().await.is_err());
    }

    #[tokio::test]
    async fn test_scoped_clears_after_failure() {
        let provider = PassthroughTokenProvider::new();

        let result: Result<(), AccessError> = provider
            .scoped("caller-c", async {
                let token = provider.get_access_token().await?;
                assert_eq!(token, "caller-c");
                Err::<(), AccessError>(AccessError::validation("handler failed"))
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::ValidationError);
        assert!(!provider.has_token());
    }

    #[test]
    fn test_guard_clears_on_panic() {
        let provider = PassthroughTokenProvider::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = provider.register("caller-d").unwrap();
            panic!("handler blew up");
        }));

        assert!(outcome.is_err());
        assert!(!provider.has_token());
    }

    #[tokio::test]
    async fn test_register_refused_while_token_registered() {
        let provider = PassthroughTokenProvider::new();
        let _guard = provider.register("caller-e").unwrap();

        let err = provider.register("caller-f").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
        assert_eq!(provider.get_access_token().await.unwrap(), "caller-e");
    }

    #[tokio::test]
    async fn test_overlapping_scoped_requests_take_turns() {
        let provider = Arc::new(PassthroughTokenProvider::new());
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = {
            let provider = provider.clone();
            tokio::spawn(async move {
                provider
                    .scoped("token-a", async {
                        let _ = registered_tx.send(());
                        let _ = release_rx.await;
                        provider.get_access_token().await
                    })
                    .await
            })
        };
        registered_rx.await.unwrap();

        let second = {
            let provider = provider.clone();
            tokio::spawn(async move {
                provider
                    .scoped("token-b", async { provider.get_access_token().await })
                    .await
            })
        };

        // The second request waits while the first is suspended
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.is_finished());
        assert_eq!(provider.get_access_token().await.unwrap(), "token-a");
        release_tx.send(()).unwrap();

        assert_eq!(first.await.unwrap().unwrap(), "token-a");
        assert_eq!(second.await.unwrap().unwrap(), "token-b");
        assert!(!provider.has_token());
    }

    #[test]
    fn test_empty_token_rejected() {
        let provider = PassthroughTokenProvider::new();
        assert!(provider.set_token("   ").is_err());
        assert!(!provider.has_token());
    }
}
