//! Command-line surface over the access layer

pub mod app;
pub mod commands;

pub use app::{Cli, Commands};

use crate::config::Settings;
use anyhow::Result;

/// Dispatch a parsed command
pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Clouds(args) => commands::clouds::handle_clouds_command(args, &settings),
        Commands::Auth(args) => commands::auth::handle_auth_command(args, settings).await,
        Commands::Raw(args) => commands::raw::handle_raw_command(args, settings).await,
    }
}
