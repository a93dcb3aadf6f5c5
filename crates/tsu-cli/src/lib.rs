//! # tsu-cli
//!
//! Command-line front end for trust-store-updater.
//!
//! - Loads (or first creates) the YAML configuration
//! - Installs the tracing subscriber
//! - Runs the reconciler against the host's trust stores
//! - Renders the run report as a colored summary, JSON or YAML

pub mod cli;
pub mod output;

pub use cli::run;
