use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug, info, warn};
use logicapps_mcp::cli::{self, Cli};
use logicapps_mcp::config::{ConfigSource, EnvVars, SettingsLoader};
use logicapps_mcp::error::format_error;

#[tokio::main]
async fn main() {
    // .env is optional
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    init_logger(rust_log_set);
    if !rust_log_set {
        let early = cli
            .log_level
            .clone()
            .or_else(|| EnvVars::from_process().get("LOG_LEVEL").map(str::to_string));
        apply_level(early.as_deref());
    }

    if let Err(error) = run(cli, rust_log_set).await {
        let formatted = format_error(&error);
        debug!("Command failed: {:#}", error);
        match serde_json::to_string_pretty(&formatted) {
            Ok(json) => println!("{}", json),
            Err(_) => eprintln!("{}: {}", formatted.kind.as_str(), formatted.message),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, rust_log_set: bool) -> Result<()> {
    let settings = SettingsLoader::new().load_with(&cli.overrides()).await?;
    if !rust_log_set {
        apply_level(Some(&settings.log_level));
    }

    match &settings.config_source {
        ConfigSource::Loaded { path } => info!("Using config file {}", path.display()),
        ConfigSource::Invalid { path, reason } => {
            warn!("Ignoring invalid config file {}: {}", path.display(), reason)
        }
        ConfigSource::Absent { .. } => debug!("No config file; using environment and defaults"),
    }
    info!("Starting logicapps-mcp against {}", settings.cloud.name);

    cli::run(cli, settings).await
}

/// Logs go to stderr; stdout carries command output
fn init_logger(rust_log_set: bool) {
    let mut builder = env_logger::Builder::new();
    builder.target(env_logger::Target::Stderr);
    if rust_log_set {
        builder.parse_default_env();
    } else {
        // Crate logs pass; the global max level set by apply_level gates them
        builder
            .filter_level(LevelFilter::Warn)
            .filter_module("logicapps_mcp", LevelFilter::Trace);
    }
    builder.init();
}

fn apply_level(level: Option<&str>) {
    let filter = level
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    log::set_max_level(filter);
}
