//! Run results, built from per-unit outcome values.

use serde::{Deserialize, Serialize};

use tsu_core::{CertSummary, Certificate, Fingerprint, Platform};

use crate::reconcile::Phase;
use crate::registry::SkippedStore;
use crate::validate::ValidationFailure;

/// A candidate the validator turned away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCertificate {
    pub fingerprint: Fingerprint,
    pub subject: String,
    pub origin: String,
    pub reason: ValidationFailure,
}

impl RejectedCertificate {
    pub fn new(cert: &Certificate, reason: ValidationFailure) -> Self {
        Self {
            fingerprint: cert.fingerprint.clone(),
            subject: cert.subject.clone(),
            origin: cert.origin.clone(),
            reason,
        }
    }
}

/// A certificate a store refused to add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCertificate {
    #[serde(flatten)]
    pub certificate: CertSummary,
    pub error: String,
}

/// What happened to one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub name: String,
    /// Certificates parsed from the source
    pub fetched: usize,
    /// Dropped by the subject filter
    pub filtered: usize,
    /// Dropped by the validator
    pub rejected: usize,
    /// Passed on to the candidate pool
    pub accepted: usize,
    /// Fetch failure; the source contributed nothing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-store result of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub store: String,
    /// Candidates missing from the store, in candidate order
    pub to_add: Vec<CertSummary>,
    /// Successfully added (always empty in a dry run)
    pub added: Vec<CertSummary>,
    /// Candidates the store already held
    pub already_present: Vec<CertSummary>,
    /// Candidates rejected by validation before diffing
    pub rejected: Vec<RejectedCertificate>,
    /// `add_certificate` failures
    pub failed: Vec<FailedCertificate>,
    /// Listing failed; nothing was diffed or applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_error: Option<String>,
    pub dry_run: bool,
}

impl ReconciliationOutcome {
    pub fn new(store: impl Into<String>, dry_run: bool) -> Self {
        Self {
            store: store.into(),
            dry_run,
            ..Self::default()
        }
    }

    /// Fingerprints of the planned additions.
    pub fn to_add_fingerprints(&self) -> Vec<&Fingerprint> {
        self.to_add.iter().map(|c| &c.fingerprint).collect()
    }

    /// Any per-unit failure on this store?
    pub fn has_failures(&self) -> bool {
        self.list_error.is_some() || !self.failed.is_empty()
    }
}

/// Everything a run did, for rendering by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub platform: Platform,
    /// Size of the deduplicated candidate pool
    pub candidates: usize,
    pub sources: Vec<SourceOutcome>,
    pub skipped_stores: Vec<SkippedStore>,
    pub outcomes: Vec<ReconciliationOutcome>,
    /// Last phase reached
    pub phase: Phase,
}

impl RunReport {
    pub fn new(dry_run: bool, platform: Platform) -> Self {
        Self {
            dry_run,
            platform,
            candidates: 0,
            sources: Vec::new(),
            skipped_stores: Vec::new(),
            outcomes: Vec::new(),
            phase: Phase::ConfigValidated,
        }
    }

    pub fn total_added(&self) -> usize {
        self.outcomes.iter().map(|o| o.added.len()).sum()
    }

    pub fn total_to_add(&self) -> usize {
        self.outcomes.iter().map(|o| o.to_add.len()).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.outcomes.iter().map(|o| o.failed.len()).sum()
    }

    /// True when something was skipped or failed, even though the run succeeded.
    pub fn has_failures(&self) -> bool {
        self.sources.iter().any(|s| s.error.is_some())
            || self.outcomes.iter().any(ReconciliationOutcome::has_failures)
    }

    pub fn outcome(&self, store: &str) -> Option<&ReconciliationOutcome> {
        self.outcomes.iter().find(|o| o.store == store)
    }
}
