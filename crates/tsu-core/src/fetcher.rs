//! Source fetching contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Certificate, CertificateSource};

/// Retrieves and parses the certificates a source currently offers.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch every certificate from `source`, attributed to its name.
    ///
    /// An error covers this source only; callers keep going with the others.
    async fn fetch(&self, source: &CertificateSource) -> Result<Vec<Certificate>>;
}
