//! Reconciliation orchestrator.
//!
//! Phases run strictly in order: config validation, store registration,
//! backup, fetch, per-store apply, post-validation. Fetches and per-store
//! applies run concurrently within their phase; backup and post-validation
//! are barriers whose failures abort the run.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use tsu_core::{
    is_elevated, CertSummary, Certificate, CertificateSource, Config, Platform, Result,
    SourceFetcher, StoreFactory, TsuError,
};

use crate::dedup::{diff, merge_candidates};
use crate::filter::SubjectFilter;
use crate::registry::{RegisteredStore, StoreRegistry};
use crate::report::{
    FailedCertificate, ReconciliationOutcome, RejectedCertificate, RunReport, SourceOutcome,
};
use crate::validate::validate;

/// Orchestrator states, in the order a run reaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    ConfigValidated,
    StoresInitialized,
    BackedUp,
    Fetched,
    PerStoreApplied,
    PostValidated,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConfigValidated => "config_validated",
            Self::StoresInitialized => "stores_initialized",
            Self::BackedUp => "backed_up",
            Self::Fetched => "fetched",
            Self::PerStoreApplied => "per_store_applied",
            Self::PostValidated => "post_validated",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Per-run settings that are not part of the config file.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Compute everything, mutate nothing
    pub dry_run: bool,
    /// Log per-certificate detail at info instead of debug
    pub verbose: bool,
    pub platform: Platform,
    /// Process holds elevated privileges
    pub privileged: bool,
    /// Instant used for validity checks and backup names
    pub now: DateTime<Utc>,
}

impl RunContext {
    /// Context for a non-dry, non-privileged run on `platform`, now.
    pub fn new(platform: Platform) -> Self {
        Self {
            dry_run: false,
            verbose: false,
            platform,
            privileged: false,
            now: Utc::now(),
        }
    }

    /// Context for the running host.
    ///
    /// # Errors
    ///
    /// `TsuError::Config` when the host OS has no backends.
    pub fn detect(dry_run: bool, verbose: bool) -> Result<Self> {
        let platform = Platform::current().ok_or_else(|| {
            TsuError::Config(format!("unsupported platform: {}", std::env::consts::OS))
        })?;
        Ok(Self {
            dry_run,
            verbose,
            privileged: is_elevated(),
            ..Self::new(platform)
        })
    }

    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub const fn with_privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    #[must_use]
    pub const fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// Where a store's snapshot goes: `<dir>/<store>_backup_<unix seconds>`.
pub fn backup_path(dir: &Path, store: &str, now: DateTime<Utc>) -> PathBuf {
    dir.join(format!("{store}_backup_{}", now.timestamp()))
}

/// One source's contribution.
struct SourceBatch {
    outcome: SourceOutcome,
    accepted: Vec<Certificate>,
    rejected: Vec<RejectedCertificate>,
}

impl SourceBatch {
    fn failed(name: &str, error: &TsuError) -> Self {
        Self {
            outcome: SourceOutcome {
                name: name.to_string(),
                error: Some(error.to_string()),
                ..SourceOutcome::default()
            },
            accepted: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

/// Drives a run from config to report.
pub struct Reconciler {
    config: Config,
    fetcher: Arc<dyn SourceFetcher>,
    factory: Arc<dyn StoreFactory>,
}

impl Reconciler {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn SourceFetcher>,
        factory: Arc<dyn StoreFactory>,
    ) -> Self {
        Self {
            config,
            fetcher,
            factory,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Worker pool bound, non-zero once the config has validated.
    fn concurrency(&self) -> usize {
        self.config.settings.max_concurrency
    }

    /// Run every phase.
    ///
    /// Success means no fatal error: sources, stores and certificates may
    /// still have been skipped, see the report.
    ///
    /// # Errors
    ///
    /// `Config` before anything runs, `Backup` before any store is
    /// mutated, `PostValidation` after mutation.
    pub async fn run(&self, ctx: &RunContext) -> Result<RunReport> {
        let mut report = RunReport::new(ctx.dry_run, ctx.platform);
        info!(dry_run = ctx.dry_run, platform = %ctx.platform, "starting trust store update");

        self.validate_config(ctx).await?;
        enter(&mut report, Phase::ConfigValidated);

        let registry = StoreRegistry::build(
            &self.config.trust_stores,
            self.factory.as_ref(),
            ctx.platform,
            ctx.privileged,
        );
        report.skipped_stores = registry.skipped().to_vec();
        enter(&mut report, Phase::StoresInitialized);

        if registry.is_empty() {
            info!("no eligible trust stores, nothing to do");
            enter(&mut report, Phase::Completed);
            return Ok(report);
        }

        if self.config.settings.backup_enabled && !ctx.dry_run {
            self.backup_all(&registry, ctx).await?;
            enter(&mut report, Phase::BackedUp);
        }

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for batch in self.fetch_all(ctx).await {
            report.sources.push(batch.outcome);
            accepted.push(batch.accepted);
            rejected.extend(batch.rejected);
        }
        let candidates = merge_candidates(accepted);
        report.candidates = candidates.len();
        info!(candidates = candidates.len(), rejected = rejected.len(), "fetched certificates from all sources");
        enter(&mut report, Phase::Fetched);

        report.outcomes = stream::iter(registry.stores())
            .map(|store| self.apply(store, &candidates, &rejected, ctx))
            .buffered(self.concurrency())
            .collect()
            .await;
        enter(&mut report, Phase::PerStoreApplied);

        if self.config.settings.validate_after && !ctx.dry_run {
            post_validate(&registry).await?;
            enter(&mut report, Phase::PostValidated);
        }

        enter(&mut report, Phase::Completed);
        info!(
            added = report.total_added(),
            planned = report.total_to_add(),
            failed = report.total_failed(),
            "trust store update completed"
        );
        Ok(report)
    }

    async fn validate_config(&self, ctx: &RunContext) -> Result<()> {
        self.config.validate()?;

        let settings = &self.config.settings;
        if settings.backup_enabled && !ctx.dry_run {
            tokio::fs::create_dir_all(&settings.backup_directory)
                .await
                .map_err(|e| {
                    TsuError::Config(format!(
                        "cannot create backup directory {}: {e}",
                        settings.backup_directory.display()
                    ))
                })?;
        }
        Ok(())
    }

    async fn backup_all(&self, registry: &StoreRegistry, ctx: &RunContext) -> Result<()> {
        let dir = &self.config.settings.backup_directory;
        info!(directory = %dir.display(), stores = registry.len(), "creating backups");

        let results = join_all(registry.stores().iter().map(|registered| async move {
            let path = backup_path(dir, registered.name(), ctx.now);
            registered
                .store
                .backup(&path)
                .await
                .map_err(|e| TsuError::backup(registered.name(), path.display().to_string(), e))
        }))
        .await;

        results.into_iter().collect::<Result<Vec<()>>>()?;
        Ok(())
    }

    async fn fetch_all(&self, ctx: &RunContext) -> Vec<SourceBatch> {
        let enabled: Vec<_> = self
            .config
            .certificate_sources
            .iter()
            .filter(|source| {
                if !source.enabled {
                    debug!(source = %source.name, "skipping disabled source");
                }
                source.enabled
            })
            .collect();

        stream::iter(enabled)
            .map(|source| self.fetch_source(source, ctx))
            .buffered(self.concurrency())
            .collect()
            .await
    }

    /// Fetch, filter and validate one source. Never fails the run.
    async fn fetch_source(&self, source: &CertificateSource, ctx: &RunContext) -> SourceBatch {
        let certs = match self.fetcher.fetch(source).await {
            Ok(certs) => certs,
            Err(e) => {
                warn!(source = %source.name, error = %e, "failed to fetch source");
                return SourceBatch::failed(&source.name, &e);
            }
        };

        let filter = SubjectFilter::new(self.config.settings.subject_filter_policy, &source.filters);
        let mut outcome = SourceOutcome {
            name: source.name.clone(),
            fetched: certs.len(),
            ..SourceOutcome::default()
        };
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for cert in certs {
            let cert = cert.with_origin(&source.name);
            if !filter.accepts(&cert) {
                outcome.filtered += 1;
                continue;
            }
            match validate(&cert, ctx.now) {
                Ok(()) => accepted.push(cert),
                Err(reason) => {
                    if ctx.verbose {
                        info!(source = %source.name, subject = %cert.subject, %reason, "certificate rejected");
                    } else {
                        debug!(source = %source.name, subject = %cert.subject, %reason, "certificate rejected");
                    }
                    rejected.push(RejectedCertificate::new(&cert, reason));
                }
            }
        }

        outcome.accepted = accepted.len();
        outcome.rejected = rejected.len();
        info!(
            source = %source.name,
            fetched = outcome.fetched,
            accepted = outcome.accepted,
            "fetched certificates from source"
        );

        SourceBatch {
            outcome,
            accepted,
            rejected,
        }
    }

    /// Diff and apply for one store. Failures stay inside the outcome.
    async fn apply(
        &self,
        registered: &RegisteredStore,
        candidates: &[Certificate],
        rejected: &[RejectedCertificate],
        ctx: &RunContext,
    ) -> ReconciliationOutcome {
        let name = registered.name();
        let mut outcome = ReconciliationOutcome::new(name, ctx.dry_run);
        outcome.rejected = rejected.to_vec();

        let current = match registered.store.list_certificates().await {
            Ok(current) => current,
            Err(e) => {
                warn!(store = name, error = %e, "failed to list current certificates, skipping store");
                outcome.list_error = Some(e.to_string());
                return outcome;
            }
        };

        let (to_add, present) = diff(&current, candidates);
        outcome.to_add = to_add.iter().map(|c| CertSummary::from(*c)).collect();
        outcome.already_present = present.iter().map(|c| CertSummary::from(*c)).collect();

        if ctx.dry_run {
            info!(store = name, count = to_add.len(), "DRY RUN: would add certificates");
            return outcome;
        }

        info!(store = name, count = to_add.len(), current = current.len(), "updating store");
        for cert in to_add {
            match registered.store.add_certificate(cert).await {
                Ok(()) => {
                    if ctx.verbose {
                        info!(store = name, subject = %cert.subject, "added certificate");
                    } else {
                        debug!(store = name, subject = %cert.subject, "added certificate");
                    }
                    outcome.added.push(cert.into());
                }
                Err(e) => {
                    warn!(store = name, subject = %cert.subject, error = %e, "failed to add certificate");
                    outcome.failed.push(FailedCertificate {
                        certificate: cert.into(),
                        error: e.to_string(),
                    });
                }
            }
        }

        outcome
    }
}

fn enter(report: &mut RunReport, phase: Phase) {
    info!(%phase, "phase reached");
    report.phase = phase;
}

/// Validate every store; all run to completion, the first failure in
/// registry order is returned.
async fn post_validate(registry: &StoreRegistry) -> Result<()> {
    let results = join_all(registry.stores().iter().map(|registered| async move {
        registered
            .store
            .validate()
            .await
            .map_err(|e| TsuError::post_validation(registered.name(), e))
    }))
    .await;

    results.into_iter().collect::<Result<Vec<()>>>()?;
    Ok(())
}
