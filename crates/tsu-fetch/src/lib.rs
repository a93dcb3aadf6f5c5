//! # tsu-fetch
//!
//! Retrieves candidate root certificates from configured sources.
//!
//! - `url`: HTTP(S) GET with headers, timeout, optional TLS verification and retries
//! - `file`: every PEM `CERTIFICATE` block, or one DER certificate
//! - `directory`: recursive walk, file names matched against glob filters

pub mod fetcher;
pub mod filter;
pub mod retry;

pub use fetcher::{Fetcher, FetcherBuilder};
pub use filter::FileFilter;
pub use retry::RetryPolicy;
