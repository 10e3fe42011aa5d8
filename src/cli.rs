//! Command-line interface.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use console::style;

use crate::config::Config;
use crate::runner;

#[derive(Parser)]
#[command(name = "nmpafetch")]
#[command(about = "NMPA drug registration data acquisition tool")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("Cannot load config from {}", cli.config.display()))?;

    if config.jobs.is_empty() {
        anyhow::bail!(
            "No jobs configured in {}; add a 'jobs' list",
            cli.config.display()
        );
    }

    println!(
        "{} {} job(s), {} engine",
        style("Running").bold().green(),
        config.jobs.len(),
        style(format!("{:?}", config.mode).to_lowercase()).cyan()
    );

    let reports = runner::run_jobs(&config).await?;

    let mut failed = 0;
    for report in &reports {
        match &report.error {
            None => {
                let files = report
                    .export
                    .as_ref()
                    .map(|p| p.raw.display().to_string())
                    .unwrap_or_default();
                println!(
                    "  {} {} '{}': {} record(s) -> {}",
                    style("ok").green(),
                    report.dataset,
                    report.search_value,
                    report.count,
                    files
                );
            }
            Some(error) => {
                failed += 1;
                println!(
                    "  {} {} '{}': {}",
                    style("failed").red(),
                    report.dataset,
                    report.search_value,
                    error
                );
            }
        }
    }

    if failed > 0 {
        println!(
            "{} {}/{} job(s) failed",
            style("Warning:").yellow().bold(),
            failed,
            reports.len()
        );
    } else {
        println!("{}", style("All jobs completed").bold().green());
    }

    Ok(())
}
