//! Settings loading
//!
//! Merges call-time overrides, environment variables, an optional per-user
//! JSON config file and hard-coded defaults into one [`Settings`] value.
//! Precedence for every field: override > environment > config file > default.
//!
//! The config file is best-effort. A missing file and an unreadable or invalid
//! one both fall back to defaults, but the outcome is recorded in
//! [`Settings::config_source`] and logged at different levels.

pub mod settings;

pub use settings::{
    ConfigFile, ConfigSource, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_CLIENT_ID, DEFAULT_LOG_LEVEL,
    DEFAULT_TENANT_ID, EnvVars, LOG_LEVELS, Settings, SettingsOverrides,
};

use crate::cloud::{CloudEndpoints, CloudRegistry};
use crate::error::AccessError;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Per-user config directory: `~/.logicapps-mcp`
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".logicapps-mcp"))
}

/// Per-user config file: `~/.logicapps-mcp/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|dir| dir.join("config.json"))
}

/// Builds [`Settings`] from its sources
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    config_path: Option<PathBuf>,
    env: EnvVars,
    registry: CloudRegistry,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    /// Loader reading the default config path and the process environment
    pub fn new() -> Self {
        Self {
            config_path: default_config_path(),
            env: EnvVars::from_process(),
            registry: CloudRegistry::new(),
        }
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_env(mut self, env: EnvVars) -> Self {
        self.env = env;
        self
    }

    pub async fn load(&self) -> Result<Settings, AccessError> {
        self.load_with(&SettingsOverrides::default()).await
    }

    /// Load settings with call-time overrides
    ///
    /// Fails only with `ConfigurationError` (unknown cloud name or malformed
    /// custom cloud); config file problems fall back to defaults.
    pub async fn load_with(&self, overrides: &SettingsOverrides) -> Result<Settings, AccessError> {
        let (file, config_source) = match &self.config_path {
            Some(path) => read_config_file(path).await,
            None => {
                debug!("No home directory; skipping config file");
                (ConfigFile::default(), ConfigSource::Absent { path: None })
            }
        };

        let tenant_id = pick(
            overrides.tenant_id.as_deref(),
            self.env.get(settings::env::TENANT_ID),
            file.tenant_id.as_deref(),
        )
        .unwrap_or(DEFAULT_TENANT_ID)
        .to_string();

        let client_id = pick(
            overrides.client_id.as_deref(),
            self.env.get(settings::env::CLIENT_ID),
            file.client_id.as_deref(),
        )
        .unwrap_or(DEFAULT_CLIENT_ID)
        .to_string();

        let default_subscription_id = pick(
            overrides.default_subscription_id.as_deref(),
            self.env.get(settings::env::SUBSCRIPTION_ID),
            file.default_subscription_id.as_deref(),
        )
        .map(str::to_string);

        let log_level = self.resolve_log_level(overrides, &file);
        let cache_ttl_seconds = self.resolve_cache_ttl(overrides, &file);
        let cloud = self.resolve_cloud(overrides, &file)?;

        debug!(
            "Settings resolved: tenant={}, cloud={}, subscription={}, log_level={}, cache_ttl={}s",
            tenant_id,
            cloud.name,
            default_subscription_id.as_deref().unwrap_or("<none>"),
            log_level,
            cache_ttl_seconds
        );

        Ok(Settings {
            tenant_id,
            client_id,
            cloud,
            default_subscription_id,
            log_level,
            cache_ttl_seconds,
            config_source,
        })
    }

    /// Cloud resolution: explicit custom > explicit name > config custom cloud
    /// (used verbatim) > `AZURE_CLOUD` > default
    fn resolve_cloud(
        &self,
        overrides: &SettingsOverrides,
        file: &ConfigFile,
    ) -> Result<CloudEndpoints, AccessError> {
        if let Some(custom) = &overrides.custom_cloud {
            custom.validate()?;
            return Ok(custom.clone());
        }

        let explicit = overrides.cloud.as_deref().filter(|n| !n.trim().is_empty());
        if explicit.is_none() {
            if let Some(custom) = file.custom_cloud()? {
                info!("Using custom cloud '{}' from config file", custom.name);
                return Ok(custom);
            }
        }

        self.registry
            .resolve(explicit, self.env.get(settings::env::CLOUD))
    }

    fn resolve_log_level(&self, overrides: &SettingsOverrides, file: &ConfigFile) -> String {
        let candidates = [
            ("override", overrides.log_level.as_deref()),
            (settings::env::LOG_LEVEL, self.env.get(settings::env::LOG_LEVEL)),
            ("config file", file.log_level.as_deref()),
        ];

        for (source, value) in candidates {
            let Some(value) = value else { continue };
            let level = value.trim().to_ascii_lowercase();
            if LOG_LEVELS.contains(&level.as_str()) {
                return level;
            }
            warn!("Ignoring invalid log level '{}' from {}", value, source);
        }

        DEFAULT_LOG_LEVEL.to_string()
    }

    fn resolve_cache_ttl(&self, overrides: &SettingsOverrides, file: &ConfigFile) -> u64 {
        if let Some(ttl) = overrides.cache_ttl_seconds {
            return ttl;
        }

        if let Some(raw) = self.env.get(settings::env::CACHE_TTL) {
            match raw.parse::<u64>() {
                Ok(ttl) => return ttl,
                Err(_) => warn!(
                    "Ignoring non-numeric {}='{}'",
                    settings::env::CACHE_TTL,
                    raw
                ),
            }
        }

        file.cache_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECONDS)
    }
}

fn pick<'a>(
    explicit: Option<&'a str>,
    env_value: Option<&'a str>,
    file_value: Option<&'a str>,
) -> Option<&'a str> {
    [explicit, env_value, file_value]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
}

/// Read the config file, never failing
async fn read_config_file(path: &Path) -> (ConfigFile, ConfigSource) {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No config file at {:?}; using defaults", path);
            return (
                ConfigFile::default(),
                ConfigSource::Absent {
                    path: Some(path.to_path_buf()),
                },
            );
        }
        Err(e) => {
            warn!("Config file {:?} could not be read, using defaults: {}", path, e);
            return (
                ConfigFile::default(),
                ConfigSource::Invalid {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                },
            );
        }
    };

    match serde_json::from_str::<ConfigFile>(&contents) {
        Ok(file) => {
            info!("Loaded config file {:?}", path);
            (
                file,
                ConfigSource::Loaded {
                    path: path.to_path_buf(),
                },
            )
        }
        Err(e) => {
            warn!("Config file {:?} is not valid JSON, using defaults: {}", path, e);
            (
                ConfigFile::default(),
                ConfigSource::Invalid {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                },
            )
        }
    }
}
