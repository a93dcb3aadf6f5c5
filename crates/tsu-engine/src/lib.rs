//! # tsu-engine
//!
//! The reconciliation engine: everything between configured sources and
//! configured stores.
//!
//! 1. [`StoreRegistry`] admits enabled, platform-eligible, permission-eligible stores
//! 2. every enabled source is fetched, subject-filtered and [`validate`]d
//! 3. candidates are merged by fingerprint ([`merge_candidates`])
//! 4. each store is [`diff`]ed and missing certificates are added
//!
//! [`Reconciler`] sequences these with backup and post-validation barriers
//! and returns a [`RunReport`].

pub mod dedup;
pub mod filter;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod validate;

#[cfg(test)]
mod testutil;

pub use dedup::{diff, merge_candidates};
pub use filter::SubjectFilter;
pub use reconcile::{backup_path, Phase, Reconciler, RunContext};
pub use registry::{RegisteredStore, SkipReason, SkippedStore, StoreRegistry};
pub use report::{
    FailedCertificate, ReconciliationOutcome, RejectedCertificate, RunReport, SourceOutcome,
};
pub use validate::{validate, ValidationFailure};
