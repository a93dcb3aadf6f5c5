//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::output::OutputFormat;
use tsu_core::DEFAULT_CONFIG_PATH;

/// Fetch trusted root certificates and add the missing ones to the
/// operating system and application trust stores.
///
/// On first run a commented configuration file is written to the config
/// path; review it, then run again.
#[derive(Parser, Debug)]
#[command(name = "trust-store-updater")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, env = "TSU_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Show what would be added without touching any trust store
    #[arg(long, env = "TSU_DRY_RUN")]
    pub dry_run: bool,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, env = "TSU_VERBOSE")]
    pub verbose: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value_t)]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
