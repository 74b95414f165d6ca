use super::commands::{AuthCommands, CloudsCommands, RawCommands};
use crate::config::SettingsOverrides;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "logicapps-mcp")]
#[command(version)]
#[command(about = "Azure Logic Apps access layer: clouds, credentials and raw ARM calls")]
pub struct Cli {
    /// Named cloud (AzurePublic, AzureGovernment, AzureChina); overrides AZURE_CLOUD
    #[arg(long, global = true)]
    pub cloud: Option<String>,

    /// Tenant id; overrides AZURE_TENANT_ID
    #[arg(long, global = true)]
    pub tenant: Option<String>,

    /// Default subscription id; overrides AZURE_SUBSCRIPTION_ID
    #[arg(long, global = true)]
    pub subscription: Option<String>,

    /// Log level (error, warn, info, debug, trace); overrides LOG_LEVEL
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the named Azure clouds
    Clouds(CloudsCommands),
    /// Local credential diagnostics
    Auth(AuthCommands),
    /// Execute a raw ARM or workflow runtime request
    Raw(RawCommands),
}

impl Cli {
    /// Call-time settings overrides taken from global flags
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            tenant_id: self.tenant.clone(),
            cloud: self.cloud.clone(),
            default_subscription_id: self.subscription.clone(),
            log_level: self.log_level.clone(),
            ..SettingsOverrides::default()
        }
    }
}
