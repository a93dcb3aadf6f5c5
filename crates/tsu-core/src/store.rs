//! The capability contract every trust store backend implements.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::platform::Platform;
use crate::types::{Certificate, StoreKind, TrustStoreTarget};

/// A platform or application trust store.
///
/// Mutating calls fail per certificate; a failed `add_certificate` must
/// leave the store usable for the next one.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Stable identifier for logs and backups.
    fn name(&self) -> &str;

    /// Whether the backend is usable on this host (tool installed, path present).
    fn is_supported(&self) -> bool;

    /// Static declaration of the privilege requirement.
    fn requires_root(&self) -> bool;

    /// Current contents.
    async fn list_certificates(&self) -> Result<Vec<Certificate>>;

    /// Trust one more certificate.
    async fn add_certificate(&self, cert: &Certificate) -> Result<()>;

    /// Stop trusting a certificate.
    async fn remove_certificate(&self, cert: &Certificate) -> Result<()>;

    /// Snapshot the whole store to `path`.
    async fn backup(&self, path: &Path) -> Result<()>;

    /// Roll the store back to a snapshot taken by [`CertificateStore::backup`].
    async fn restore(&self, path: &Path) -> Result<()>;

    /// Post-condition check: is the backend still in a usable state?
    async fn validate(&self) -> Result<()>;
}

/// Builds stores from configured targets.
pub trait StoreFactory: Send + Sync {
    /// Instantiate the backend for `target` on `platform`.
    ///
    /// # Errors
    ///
    /// `TsuError::UnsupportedTarget` when nothing is registered for the
    /// (platform, kind, target) triple, or a backend-specific error when
    /// its options are invalid.
    fn create_store(
        &self,
        target: &TrustStoreTarget,
        platform: Platform,
    ) -> Result<Box<dyn CertificateStore>>;

    /// Target identifiers available for a platform and store kind.
    fn supported_targets(&self, platform: Platform, kind: StoreKind) -> Vec<String>;
}
