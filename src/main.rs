mod auth;
mod catalog;
mod cli;
mod config;
mod error;
mod executor;
#[cfg(test)]
mod fake;
mod filter;
mod guard;
mod models;
mod output;
mod pipeline;
mod registry;
mod retention;

use std::process;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, LogFormat};
use config::RunConfig;
use output::{print_report, print_summary, RunSummary};
use registry::RegistryClient;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = RunConfig::from_cli(&cli, Utc::now(), || {
        rpassword::prompt_password("Password: ")
    })?;

    tracing::debug!(
        deadline = %config.retention.deadline,
        latest = config.retention.latest,
        dry_run = config.dry_run,
        "Retention policy"
    );

    let client = RegistryClient::connect(
        &config.registry,
        config.credentials.clone(),
        config.insecure,
        config.timeout,
    )
    .await?;

    let reports = pipeline::run(&client, &config).await?;

    if reports.is_empty() {
        println!("No repositories found.");
        return Ok(());
    }

    for report in &reports {
        print_report(report, config.dry_run);
    }
    print_summary(&RunSummary::from_reports(&reports), config.dry_run);

    Ok(())
}
