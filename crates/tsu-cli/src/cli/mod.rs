//! CLI argument parsing and run orchestration.

pub mod args;

use anyhow::{bail, Context, Result};
use args::Cli;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tsu_core::Config;
use tsu_engine::{Reconciler, RunContext};
use tsu_fetch::Fetcher;
use tsu_platform::BackendRegistry;

use crate::output;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if !cli.config.exists() {
        Config::write_default(&cli.config).with_context(|| {
            format!("failed to write default configuration to {}", cli.config.display())
        })?;
        bail!(
            "no configuration found; a default was written to {}. Review it and run again",
            cli.config.display()
        );
    }

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    init_tracing(cli.verbose, &config.settings.log_level);
    info!(config = %cli.config.display(), "loaded configuration");

    let ctx = RunContext::detect(cli.dry_run, cli.verbose)?;
    let fetcher = Fetcher::from_settings(&config.settings)?;
    let reconciler = Reconciler::new(
        config,
        Arc::new(fetcher),
        Arc::new(BackendRegistry::with_defaults()),
    );

    let report = reconciler
        .run(&ctx)
        .await
        .context("trust store update failed")?;

    output::print_report(&report, cli.output)
}

/// `RUST_LOG` wins, then `--verbose`, then `settings.log_level`.
///
/// Logs go to stderr so a JSON or YAML report on stdout stays parseable.
fn init_tracing(verbose: bool, log_level: &str) {
    let fallback = if verbose { "debug" } else { log_level };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
