//! Named Azure cloud endpoint sets
//!
//! A fixed table of the public, US Government and China clouds. Lookups are
//! exact-match by name; sovereign or private deployments can bypass the table
//! with a custom [`CloudEndpoints`] value that is only checked for required
//! fields.

use crate::error::AccessError;
use serde::{Deserialize, Serialize};

/// Environment variable selecting a named cloud
pub const AZURE_CLOUD_ENV: &str = "AZURE_CLOUD";

/// Cloud used when nothing else is specified
pub const DEFAULT_CLOUD: &str = "AzurePublic";

/// One Azure cloud variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudEndpoints {
    pub name: String,
    pub authentication: AuthenticationEndpoints,
    pub resource_manager: String,
    pub suffixes: CloudSuffixes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationEndpoints {
    pub login_endpoint: String,
    pub token_audience: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSuffixes {
    /// Hostname suffix for per-app hostnames, including the leading dot
    pub azure_websites: String,
}

impl CloudEndpoints {
    fn named(name: &str, login: &str, resource_manager: &str, websites: &str) -> Self {
        Self {
            name: name.to_string(),
            authentication: AuthenticationEndpoints {
                login_endpoint: login.to_string(),
                token_audience: format!("{}/", resource_manager),
            },
            resource_manager: resource_manager.to_string(),
            suffixes: CloudSuffixes {
                azure_websites: websites.to_string(),
            },
        }
    }

    /// Check a user-supplied endpoint set for required fields
    ///
    /// Reachability is not checked.
    pub fn validate(&self) -> Result<(), AccessError> {
        let required = [
            ("name", &self.name),
            ("authentication.loginEndpoint", &self.authentication.login_endpoint),
            ("authentication.tokenAudience", &self.authentication.token_audience),
            ("resourceManager", &self.resource_manager),
            ("suffixes.azureWebsites", &self.suffixes.azure_websites),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AccessError::configuration(format!(
                "Custom cloud is missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Resource manager base URL without a trailing slash
    pub fn resource_manager_base(&self) -> &str {
        self.resource_manager.trim_end_matches('/')
    }
}

/// Static registry of named clouds
#[derive(Debug, Clone)]
pub struct CloudRegistry {
    clouds: Vec<CloudEndpoints>,
}

impl Default for CloudRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudRegistry {
    pub fn new() -> Self {
        Self {
            clouds: vec![
                CloudEndpoints::named(
                    "AzurePublic",
                    "https://login.microsoftonline.com",
                    "https://management.azure.com",
                    ".azurewebsites.net",
                ),
                CloudEndpoints::named(
                    "AzureGovernment",
                    "https://login.microsoftonline.us",
                    "https://management.usgovcloudapi.net",
                    ".azurewebsites.us",
                ),
                CloudEndpoints::named(
                    "AzureChina",
                    "https://login.chinacloudapi.cn",
                    "https://management.chinacloudapi.cn",
                    ".chinacloudsites.cn",
                ),
            ],
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.clouds.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CloudEndpoints> {
        self.clouds.iter()
    }

    pub fn get(&self, name: &str) -> Option<&CloudEndpoints> {
        self.clouds.iter().find(|c| c.name == name)
    }

    /// Resolve a cloud: explicit name, else environment override, else `AzurePublic`
    ///
    /// Empty strings count as "not supplied".
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        env_override: Option<&str>,
    ) -> Result<CloudEndpoints, AccessError> {
        let name = explicit
            .filter(|n| !n.trim().is_empty())
            .or(env_override.filter(|n| !n.trim().is_empty()))
            .unwrap_or(DEFAULT_CLOUD);

        self.get(name).cloned().ok_or_else(|| {
            AccessError::configuration(format!(
                "Unknown Azure cloud '{}'. Valid clouds: {}",
                name,
                self.names().join(", ")
            ))
        })
    }
}
