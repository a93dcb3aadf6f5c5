//! Core types for trust store reconciliation.

pub mod cert;
pub mod source;
pub mod target;

pub use cert::{CertSummary, Certificate, Fingerprint, KeyUsage};
pub use source::{CertificateSource, SourceKind};
pub use target::{StoreKind, TrustStoreTarget};
