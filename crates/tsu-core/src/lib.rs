//! # tsu-core
//!
//! Core types and contracts for trust-store-updater.
//!
//! - [`Certificate`]: parsed X.509 certificate keyed by its SHA-256 fingerprint
//! - [`parse_certificates`]: PEM bundle / DER parsing with per-block isolation
//! - [`Config`]: sources, targets and settings loaded from YAML
//! - [`CertificateStore`] / [`StoreFactory`]: the backend capability contract
//! - [`SourceFetcher`]: how candidate certificates are acquired
//! - [`TsuError`]: error taxonomy shared by every crate

pub mod config;
pub mod error;
pub mod fetcher;
pub mod hash;
pub mod parse;
pub mod platform;
pub mod store;
pub mod types;

pub use config::{Config, Settings, SubjectFilterPolicy, DEFAULT_CONFIG_PATH};
pub use error::{Result, TsuError};
pub use fetcher::SourceFetcher;
pub use parse::parse_certificates;
pub use platform::{is_elevated, Platform};
pub use store::{CertificateStore, StoreFactory};
pub use types::*;
