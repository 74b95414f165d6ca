use crate::cloud::CloudRegistry;
use crate::config::Settings;
use anyhow::Result;
use clap::Args;
use colored::*;

#[derive(Args)]
pub struct CloudsCommands {
    /// Print the endpoint sets as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn handle_clouds_command(args: CloudsCommands, settings: &Settings) -> Result<()> {
    let registry = CloudRegistry::new();

    if args.json {
        let clouds: Vec<_> = registry.iter().collect();
        println!("{}", serde_json::to_string_pretty(&clouds)?);
        return Ok(());
    }

    println!();
    println!("  {}", "Azure clouds:".bright_white().bold());
    for cloud in registry.iter() {
        let marker = if cloud.name == settings.cloud.name {
            "•".bright_green()
        } else {
            " ".normal()
        };
        println!(
            "  {} {} {} {}",
            marker,
            cloud.name.bright_yellow().bold(),
            cloud.resource_manager.cyan(),
            cloud.suffixes.azure_websites.dimmed()
        );
    }

    if registry.get(&settings.cloud.name).is_none() {
        println!(
            "  {} {} {} (custom)",
            "•".bright_green(),
            settings.cloud.name.bright_yellow().bold(),
            settings.cloud.resource_manager.cyan()
        );
    }
    println!();
    Ok(())
}
