//! Settings value and the raw inputs it is merged from

use crate::cloud::CloudEndpoints;
use crate::error::AccessError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_TENANT_ID: &str = "common";

/// Azure CLI public client id, usable without an app registration
pub const DEFAULT_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Environment variable names read by the loader
pub mod env {
    pub const TENANT_ID: &str = "AZURE_TENANT_ID";
    pub const CLIENT_ID: &str = "AZURE_CLIENT_ID";
    pub const SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";
    pub const CLOUD: &str = crate::cloud::AZURE_CLOUD_ENV;
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const CACHE_TTL: &str = "CACHE_TTL";
}

/// Process-wide settings, loaded once and read-only afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub tenant_id: String,
    pub client_id: String,
    pub cloud: CloudEndpoints,
    pub default_subscription_id: Option<String>,
    pub log_level: String,
    pub cache_ttl_seconds: u64,
    /// What happened when the config file was read
    pub config_source: ConfigSource,
}

impl Settings {
    /// Subscription to operate on: the explicit one, else the configured default
    pub fn subscription_or(&self, explicit: Option<&str>) -> Result<String, AccessError> {
        explicit
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_subscription_id.clone())
            .ok_or_else(|| {
                AccessError::validation(format!(
                    "subscriptionId is required (pass it explicitly or set {})",
                    env::SUBSCRIPTION_ID
                ))
            })
    }
}

/// Outcome of the best-effort config file read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// No file at the expected location (or no home directory to look in)
    Absent { path: Option<PathBuf> },
    Loaded { path: PathBuf },
    /// A file exists but could not be read or parsed; defaults were used
    Invalid { path: PathBuf, reason: String },
}

/// On-disk config file, all fields optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub default_subscription_id: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub cache_ttl_seconds: Option<u64>,
    /// Kept raw so a malformed cloud is reported as a configuration error
    /// instead of discarding the whole file
    #[serde(default)]
    pub custom_cloud: Option<Value>,
}

impl ConfigFile {
    /// Decode and validate `customCloud`, if present
    pub fn custom_cloud(&self) -> Result<Option<CloudEndpoints>, AccessError> {
        let Some(raw) = &self.custom_cloud else {
            return Ok(None);
        };

        let cloud: CloudEndpoints = serde_json::from_value(raw.clone()).map_err(|e| {
            AccessError::configuration(format!("customCloud in config file is malformed: {}", e))
        })?;
        cloud.validate()?;
        Ok(Some(cloud))
    }
}

/// Call-time arguments, highest precedence
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub cloud: Option<String>,
    pub custom_cloud: Option<CloudEndpoints>,
    pub default_subscription_id: Option<String>,
    pub log_level: Option<String>,
    pub cache_ttl_seconds: Option<u64>,
}

/// Snapshot of environment variables
///
/// Empty and whitespace-only values are treated as unset.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}
