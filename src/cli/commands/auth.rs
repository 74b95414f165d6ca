use crate::api::AccessContext;
use crate::auth::TokenStatus;
use crate::config::Settings;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use colored::*;
use std::sync::Arc;

#[derive(Args)]
pub struct AuthCommands {
    #[command(subcommand)]
    pub command: AuthSubcommands,
}

#[derive(Subcommand)]
pub enum AuthSubcommands {
    /// Acquire a token with the local credential and show who it belongs to
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_auth_command(args: AuthCommands, settings: Settings) -> Result<()> {
    match args.command {
        AuthSubcommands::Status { json } => status_command(settings, json).await,
    }
}

async fn status_command(settings: Settings, json: bool) -> Result<()> {
    let context = AccessContext::local(Arc::new(settings))?;
    context
        .initialize()
        .await
        .context("Local credential is not usable")?;
    let status = context.tokens().status().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    print_status(context.settings(), &status);
    Ok(())
}

fn print_status(settings: &Settings, status: &TokenStatus) {
    println!();
    println!("  {}", "Authentication status".bright_white().bold());
    println!("  {} {}", "Mode:".dimmed(), status.mode.to_string().bright_yellow());
    println!("  {} {}", "Cloud:".dimmed(), settings.cloud.name.bright_green().bold());
    println!("  {} {}", "Tenant:".dimmed(), settings.tenant_id);

    match &status.identity {
        Some(identity) => println!("  {} {}", "Identity:".dimmed(), identity.bright_yellow().bold()),
        None => println!("  {} {}", "Identity:".dimmed(), "unknown".dimmed()),
    }

    if let Some(expires_on) = status.expires_on {
        let minutes = (expires_on - Utc::now()).num_minutes();
        println!(
            "  {} {} ({} min left)",
            "Token expires:".dimmed(),
            expires_on.to_rfc3339(),
            minutes
        );
    }

    if status.has_token {
        println!("  {} Token acquired", "✓".bright_green().bold());
    } else {
        println!("  {} No token cached", "✗".bright_red().bold());
    }
    println!();
}
