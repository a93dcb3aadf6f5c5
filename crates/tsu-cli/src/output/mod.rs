//! Output formatting for different formats.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use tsu_engine::{ReconciliationOutcome, RunReport, SourceOutcome};

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Colored summary
    #[default]
    Pretty,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

/// Print a run report to stdout.
pub fn print_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Pretty => render_pretty(report),
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

/// Human-readable summary.
pub fn render_pretty(report: &RunReport) -> String {
    let mut out = String::new();

    let mode = if report.dry_run {
        " (dry run)".yellow().to_string()
    } else {
        String::new()
    };
    let _ = writeln!(out, "{}{mode} on {}", "Trust store update".bold(), report.platform);

    if !report.sources.is_empty() {
        let _ = writeln!(out, "\n{}", "Sources".bold());
        for source in &report.sources {
            let _ = writeln!(out, "  {}", source_line(source));
        }
        let _ = writeln!(out, "  {} unique candidate(s)", report.candidates);
    }

    if !report.outcomes.is_empty() {
        let _ = writeln!(out, "\n{}", "Stores".bold());
        for outcome in &report.outcomes {
            write_outcome(&mut out, outcome);
        }
    }

    if !report.skipped_stores.is_empty() {
        let _ = writeln!(out, "\n{}", "Skipped stores".bold());
        for skipped in &report.skipped_stores {
            let _ = writeln!(out, "  - {}: {}", skipped.name, skipped.reason.to_string().dimmed());
        }
    }

    let summary = if report.dry_run {
        format!("{} certificate(s) would be added", report.total_to_add())
    } else {
        format!(
            "{} certificate(s) added, {} failed",
            report.total_added(),
            report.total_failed()
        )
    };
    let summary = if report.has_failures() {
        summary.yellow()
    } else {
        summary.green()
    };
    let _ = writeln!(out, "\n{summary}");

    out
}

fn source_line(source: &SourceOutcome) -> String {
    match &source.error {
        Some(error) => format!("{} {}: {}", "x".red(), source.name, error.red()),
        None => format!(
            "{} {}: {} fetched, {} accepted, {} rejected, {} filtered",
            "+".green(),
            source.name,
            source.fetched,
            source.accepted,
            source.rejected,
            source.filtered
        ),
    }
}

fn write_outcome(out: &mut String, outcome: &ReconciliationOutcome) {
    if let Some(error) = &outcome.list_error {
        let _ = writeln!(out, "  {} {}: {}", "x".red(), outcome.store.bold(), error.red());
        return;
    }

    let _ = writeln!(
        out,
        "  {}: {} to add, {} added, {} present, {} rejected, {} failed",
        outcome.store.bold(),
        outcome.to_add.len(),
        outcome.added.len(),
        outcome.already_present.len(),
        outcome.rejected.len(),
        outcome.failed.len()
    );

    let planned = if outcome.dry_run {
        &outcome.to_add
    } else {
        &outcome.added
    };
    for cert in planned {
        let _ = writeln!(
            out,
            "    {} {} [{}]",
            "+".green(),
            cert.subject,
            cert.fingerprint.short().dimmed()
        );
    }
    for failed in &outcome.failed {
        let _ = writeln!(
            out,
            "    {} {}: {}",
            "!".red(),
            failed.certificate.subject,
            failed.error
        );
    }
}
