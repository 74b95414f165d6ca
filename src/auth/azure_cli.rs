//! Local credential source backed by the Azure CLI login
//!
//! Tokens come from `az account get-access-token`, so whatever identity the
//! user signed in with via `az login` is used. Nothing is persisted here.

use super::CachedToken;
use crate::error::AccessError;
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use log::{debug, warn};
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;

const REMEDIATION: &str = "Run `az login` (and `az account set --subscription <id>` if needed), then retry.";

/// Somewhere on the host that can mint access tokens
#[async_trait]
pub trait CredentialSource: Send + Sync {
    fn name(&self) -> &str;

    /// Confirm the source is available and signed in; returns an identity label
    async fn verify(&self) -> Result<Option<String>, AccessError>;

    /// Mint a token for `audience`
    async fn acquire(&self, audience: &str, tenant_id: Option<&str>) -> Result<CachedToken, AccessError>;
}

/// Azure CLI (`az`) credential
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
    timeout: Duration,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureCliCredential {
    pub fn new() -> Self {
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        Self {
            program: program.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Use a different `az` executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn run(&self, args: &[&str]) -> Result<String, AccessError> {
        debug!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AccessError::authentication(format!(
                    "Azure CLI ('{}') was not found on PATH. Install the Azure CLI, then {}",
                    self.program,
                    REMEDIATION.to_lowercase()
                )));
            }
            Ok(Err(e)) => {
                return Err(AccessError::authentication(format!(
                    "Failed to run Azure CLI: {}. {}",
                    e, REMEDIATION
                )));
            }
            Err(_) => {
                return Err(AccessError::authentication(format!(
                    "Azure CLI did not respond within {}s. {}",
                    self.timeout.as_secs(),
                    REMEDIATION
                )));
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(AccessError::authentication(format!(
                "Azure CLI is not signed in or failed: {}. {}",
                stderr.trim(),
                REMEDIATION
            )))
        }
    }
}

#[async_trait]
impl CredentialSource for AzureCliCredential {
    fn name(&self) -> &str {
        "azure-cli"
    }

    async fn verify(&self) -> Result<Option<String>, AccessError> {
        let stdout = self.run(&["account", "show", "--output", "json"]).await?;
        parse_account(&stdout).map(Some)
    }

    async fn acquire(&self, audience: &str, tenant_id: Option<&str>) -> Result<CachedToken, AccessError> {
        let mut args = vec![
            "account",
            "get-access-token",
            "--resource",
            audience,
            "--output",
            "json",
        ];
        if let Some(tenant) = tenant_id {
            args.push("--tenant");
            args.push(tenant);
        }

        let stdout = self.run(&args).await?;
        parse_token_output(&stdout)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountShow {
    id: Option<String>,
    name: Option<String>,
    user: Option<AccountUser>,
}

#[derive(Debug, Deserialize)]
struct AccountUser {
    name: Option<String>,
}

/// Identity label from `az account show`: `user (subscription)`
pub(crate) fn parse_account(stdout: &str) -> Result<String, AccessError> {
    let account: AccountShow = serde_json::from_str(stdout).map_err(|e| {
        AccessError::authentication(format!(
            "Unexpected output from `az account show`: {}. {}",
            e, REMEDIATION
        ))
    })?;

    let subscription = account.name.or(account.id).unwrap_or_else(|| "unknown subscription".to_string());
    Ok(match account.user.and_then(|u| u.name) {
        Some(user) => format!("{} ({})", user, subscription),
        None => subscription,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenOutput {
    access_token: String,
    /// Local time, e.g. `2024-05-01 13:45:10.000000`
    expires_on: Option<String>,
    /// Epoch seconds, present in newer CLI versions
    #[serde(rename = "expires_on")]
    expires_on_epoch: Option<i64>,
    subscription: Option<String>,
}

/// Parse `az account get-access-token` output into a [`CachedToken`]
pub(crate) fn parse_token_output(stdout: &str) -> Result<CachedToken, AccessError> {
    let output: AccessTokenOutput = serde_json::from_str(stdout).map_err(|e| {
        AccessError::authentication(format!(
            "Unexpected output from `az account get-access-token`: {}. {}",
            e, REMEDIATION
        ))
    })?;

    if output.access_token.trim().is_empty() {
        return Err(AccessError::authentication(format!(
            "Azure CLI returned an empty access token. {}",
            REMEDIATION
        )));
    }

    let expires_on = output
        .expires_on_epoch
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .or_else(|| output.expires_on.as_deref().and_then(parse_local_timestamp))
        .unwrap_or_else(|| {
            // Default to 1 hour if not provided
            warn!("Azure CLI token has no parseable expiry; assuming one hour");
            Utc::now() + chrono::Duration::hours(1)
        });

    let token = CachedToken::new(output.access_token, expires_on);
    Ok(match output.subscription {
        Some(subscription) => token.with_identity(subscription),
        None => token,
    })
}

fn parse_local_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_token_with_epoch() {
        let stdout = r#"{
            "accessToken": "eyJ0eXAi.token",
            "expiresOn": "2030-01-01 00:00:00.000000",
            "expires_on": 1893456000,
            "subscription": "00000000-0000-0000-0000-000000000001",
            "tenant": "tenant-1",
            "tokenType": "Bearer"
        }"#;

        let token = parse_token_output(stdout).unwrap();
        assert_eq!(token.access_token, "eyJ0eXAi.token");
        assert_eq!(token.expires_on.timestamp(), 1893456000);
        assert_eq!(token.identity.as_deref(), Some("00000000-0000-0000-0000-000000000001"));
    }

    #[test]
    fn test_parse_token_with_local_time_only() {
        let stdout = r#"{"accessToken": "abc", "expiresOn": "2030-06-01 12:30:00.123456"}"#;
        let token = parse_token_output(stdout).unwrap();
        assert!(token.expires_on > Utc::now());
        assert!(token.identity.is_none());
    }

    #[test]
    fn test_parse_token_missing_expiry_defaults_to_an_hour() {
        let token = parse_token_output(r#"{"accessToken": "abc"}"#).unwrap();
        let remaining = token.remaining(Utc::now());
        assert!(remaining > chrono::Duration::minutes(59));
        assert!(remaining <= chrono::Duration::hours(1));
    }

    #[test]
    fn test_parse_token_rejects_garbage() {
        let err = parse_token_output("ERROR: Please run 'az login'").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
        assert!(err.to_string().contains("az login"));

        let err = parse_token_output(r#"{"accessToken": " "}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
    }

    #[test]
    fn test_parse_account_label() {
        let stdout = r#"{"id": "sub-id", "name": "Contoso Dev", "user": {"name": "dev@contoso.com", "type": "user"}}"#;
        assert_eq!(parse_account(stdout).unwrap(), "dev@contoso.com (Contoso Dev)");

        assert_eq!(parse_account(r#"{"id": "sub-id"}"#).unwrap(), "sub-id");
    }

    #[tokio::test]
    async fn test_missing_binary_is_authentication_error() {
        let credential = AzureCliCredential::new().with_program("definitely-not-az-cli-binary");
        let err = credential.verify().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
        assert!(err.to_string().contains("not found"));
    }
}
