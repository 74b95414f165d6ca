//! Raw ARM / workflow runtime request command

use crate::api::{AccessContext, ArmList, Method};
use crate::config::Settings;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::*;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Args)]
pub struct RawCommands {
    /// Path under the target host, e.g. "/subscriptions?api-version=2022-12-01"
    #[arg(help = "Request path or same-host URL")]
    pub path: String,

    /// HTTP method
    #[arg(long, default_value = "get", help = "HTTP method")]
    pub method: HttpMethod,

    /// Request body data (JSON)
    #[arg(long, help = "Request body data (JSON string)")]
    pub data: Option<String>,

    /// Follow nextLink and print every item as one { value: [...] } document
    #[arg(long)]
    pub all_pages: bool,

    /// Standard Logic App name; targets its workflow runtime host instead of ARM
    #[arg(long)]
    pub app: Option<String>,

    /// Output format
    #[arg(long, default_value = "json", help = "Output format")]
    pub format: OutputFormat,

    /// Display style
    #[arg(long, default_value = "minimal", help = "Display style")]
    pub style: DisplayStyle,

    /// Use this bearer token instead of the local credential
    #[arg(long, env = "LOGICAPPS_BEARER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Save results to file
    #[arg(short, long, help = "Save results to file")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    fn to_method(&self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    fn takes_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    Json,
    /// Compact JSON (no whitespace, for piping)
    JsonCompact,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum DisplayStyle {
    /// Data only, no decorations (default)
    Minimal,
    /// Include target host, timing and item counts
    Verbose,
}

/// Handle the raw API command
pub async fn handle_raw_command(args: RawCommands, settings: Settings) -> Result<()> {
    let settings = Arc::new(settings);
    let context = match args.token.as_deref() {
        Some(token) => AccessContext::for_request(settings, token)?,
        None => AccessContext::local(settings)?,
    };

    let body = parse_body(&args)?;
    let verbose = matches!(args.style, DisplayStyle::Verbose);

    if verbose {
        let target = match &args.app {
            Some(app) => format!("workflow runtime of {}", app),
            None => context.client().resource_manager().to_string(),
        };
        eprintln!("Target: {}", target.bright_green().bold());
        eprintln!("Method: {}", format!("{:?}", args.method).bright_yellow());
        eprintln!("Path: {}", args.path.cyan());
        eprintln!("Auth: {}", context.tokens().mode().to_string().dimmed());
        eprintln!();
    }

    let started = Instant::now();
    let result = execute(&context, &args, body.as_ref()).await?;

    if verbose {
        if let Some(items) = result.get("value").and_then(Value::as_array) {
            eprintln!("Items: {}", items.len().to_string().bright_white().bold());
        }
        eprintln!("Execution time: {:.2}ms", started.elapsed().as_secs_f64() * 1000.0);
        eprintln!();
    }

    let formatted = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&result),
        OutputFormat::JsonCompact => serde_json::to_string(&result),
    }
    .context("Failed to format JSON output")?;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &formatted)
                .await
                .with_context(|| format!("Failed to write output to: {}", path.display()))?;
            if verbose {
                eprintln!("Results saved to: {}", path.display().to_string().bright_green());
            }
        }
        None => println!("{}", formatted),
    }

    Ok(())
}

async fn execute(context: &AccessContext, args: &RawCommands, body: Option<&Value>) -> Result<Value> {
    let client = context.client();
    let method = args.method.to_method();

    let value = match (&args.app, args.all_pages) {
        (None, false) => client.request::<Value>(method, &args.path, body).await?,
        (Some(app), false) => client.workflow_request::<Value>(app, method, &args.path, body).await?,
        (None, true) => {
            let value = client.request_all_pages::<Value>(method, &args.path).await?;
            serde_json::to_value(ArmList { value })?
        }
        (Some(app), true) => {
            let value = client.workflow_request_all_pages::<Value>(app, method, &args.path).await?;
            serde_json::to_value(ArmList { value })?
        }
    };

    Ok(value)
}

fn parse_body(args: &RawCommands) -> Result<Option<Value>> {
    match (&args.data, args.method.takes_body()) {
        (Some(data), true) => {
            let value = serde_json::from_str(data).map_err(|e| {
                crate::error::AccessError::validation(format!("--data is not valid JSON: {}", e))
            })?;
            Ok(Some(value))
        }
        (Some(_), false) => Err(crate::error::AccessError::validation(format!(
            "{:?} requests do not take --data",
            args.method
        ))
        .into()),
        (None, true) if !args.all_pages => Err(crate::error::AccessError::validation(format!(
            "{:?} request requires --data",
            args.method
        ))
        .into()),
        (None, _) => Ok(None),
    }
}
