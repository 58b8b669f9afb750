//! # Informant AMP CLI (`informant`)
//!
//! Publishes CMS reports as AMP pages to the website bucket, removes them
//! again, previews rendering, and runs the webhook server the CMS calls.
//!
//! ## Usage
//!
//! ```bash
//! informant --config ./config/informant.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `informant publish <id>` | Fetch, render, and publish one report |
//! | `informant delete <id> --created <ts>` | Unpublish a report deleted in the CMS |
//! | `informant render <id>` | Print the rendered page without publishing |
//! | `informant validate <file>` | Run the AMP check on a local HTML file |
//! | `informant serve` | Start the webhook HTTP server |
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); command results are
//! printed to stdout as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use informant_amp::amp::{AmpValidator, StructuralValidator};
use informant_amp::config;
use informant_amp::pipeline::Pipeline;
use informant_amp::server;
use informant_core::models::ReportId;

/// Informant AMP: publishes CMS reports as static AMP pages and keeps the
/// site's sitemaps in sync.
#[derive(Parser)]
#[command(name = "informant", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Settings can also come from the environment (`CMS_API_URL`,
    /// `SITE_ORIGIN`, `BUCKET_NAME`), in which case the file may be absent.
    #[arg(long, global = true, default_value = "./config/informant.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish or republish a report.
    ///
    /// Old slugs of the same report become redirects to the new page.
    Publish {
        #[arg(value_parser = parse_report_id)]
        id: ReportId,
    },

    /// Unpublish a report that no longer exists in the CMS.
    Delete {
        #[arg(value_parser = parse_report_id)]
        id: ReportId,
        /// Creation timestamp of the report (RFC 3339).
        #[arg(long, value_parser = parse_timestamp)]
        created: DateTime<FixedOffset>,
    },

    /// Render a report to stdout without publishing it.
    Render {
        #[arg(value_parser = parse_report_id)]
        id: ReportId,
    },

    /// Check a local HTML file against the AMP rules.
    Validate { path: PathBuf },

    /// Start the webhook server on `[server].bind`.
    Serve,
}

fn parse_report_id(s: &str) -> Result<ReportId, String> {
    ReportId::new(s)
        .ok_or_else(|| "report id must be non-empty ASCII letters and digits".to_string())
}

fn parse_timestamp(s: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(s).map_err(|e| format!("invalid RFC 3339 timestamp '{}': {}", s, e))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Validate { path } = &cli.command {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let result = StructuralValidator::new().validate(&html);
        print_json(&result)?;
        if !result.passed() {
            bail!("{} failed AMP validation", path.display());
        }
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let pipeline = Arc::new(Pipeline::from_config(&cfg)?);

    match cli.command {
        Commands::Publish { id } => {
            let outcome = pipeline.publish(&id).await?;
            print_json(&outcome)?;
        }
        Commands::Delete { id, created } => {
            let outcome = pipeline.delete(&id, &created).await?;
            print_json(&outcome)?;
        }
        Commands::Render { id } => {
            let page = pipeline.render_report(&id).await?;
            println!("{}", page.html);
            if !page.validation.passed() {
                tracing::warn!(
                    errors = page.validation.error_count(),
                    "rendered page is not valid AMP"
                );
            }
        }
        Commands::Serve => {
            server::run_server(&cfg, pipeline).await?;
        }
        Commands::Validate { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
