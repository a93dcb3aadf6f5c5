//! Backend registry: (platform, store kind, target id) to constructor.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use tsu_core::{
    CertificateStore, Platform, Result, StoreFactory, StoreKind, TrustStoreTarget, TsuError,
};

use crate::anchor_dir::AnchorDirStore;
use crate::certutil::WindowsStore;
use crate::java::JavaCacertsStore;
use crate::keychain::KeychainStore;

/// Builds a store for one configured target.
pub type Constructor =
    Arc<dyn Fn(&TrustStoreTarget) -> Result<Box<dyn CertificateStore>> + Send + Sync>;

const ALL_PLATFORMS: [Platform; 3] = [Platform::Linux, Platform::Darwin, Platform::Windows];

/// Maps target identifiers to backend constructors.
///
/// Adding a backend is a [`BackendRegistry::register`] call.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<(Platform, StoreKind, String), Constructor>,
}

impl BackendRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in backend.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(Platform::Linux, StoreKind::System, "ca-certificates", |t| {
            Ok(Box::new(AnchorDirStore::ca_certificates(t)))
        });
        registry.register(Platform::Linux, StoreKind::System, "update-ca-trust", |t| {
            Ok(Box::new(AnchorDirStore::update_ca_trust(t)))
        });

        registry.register(Platform::Darwin, StoreKind::System, "system-keychain", |t| {
            Ok(Box::new(KeychainStore::system(t)))
        });
        registry.register(Platform::Darwin, StoreKind::System, "login-keychain", |t| {
            Ok(Box::new(KeychainStore::login(t)?))
        });

        for id in ["root", "ca", "my", "trust"] {
            registry.register(Platform::Windows, StoreKind::System, id, |t| {
                Ok(Box::new(WindowsStore::new(t)?))
            });
        }

        for platform in ALL_PLATFORMS {
            registry.register(platform, StoreKind::Application, "docker", |t| {
                Ok(Box::new(AnchorDirStore::docker(t)))
            });
            registry.register(platform, StoreKind::Application, "pem-directory", |t| {
                Ok(Box::new(AnchorDirStore::pem_directory(t)?))
            });
            registry.register(platform, StoreKind::Application, "java-cacerts", |t| {
                Ok(Box::new(JavaCacertsStore::new(t)?))
            });
        }

        registry
    }

    /// Register (or replace) the constructor for a target id.
    pub fn register<F>(&mut self, platform: Platform, kind: StoreKind, target: &str, ctor: F)
    where
        F: Fn(&TrustStoreTarget) -> Result<Box<dyn CertificateStore>> + Send + Sync + 'static,
    {
        self.backends
            .insert((platform, kind, target.to_lowercase()), Arc::new(ctor));
    }
}

impl StoreFactory for BackendRegistry {
    fn create_store(
        &self,
        target: &TrustStoreTarget,
        platform: Platform,
    ) -> Result<Box<dyn CertificateStore>> {
        let key = (platform, target.kind, target.target.to_lowercase());
        let ctor = self
            .backends
            .get(&key)
            .ok_or_else(|| TsuError::UnsupportedTarget {
                kind: target.kind.to_string(),
                target: target.target.clone(),
                platform: platform.to_string(),
            })?;

        debug!(store = %target.name, target = %target.target, %platform, "creating store backend");
        ctor(target)
    }

    fn supported_targets(&self, platform: Platform, kind: StoreKind) -> Vec<String> {
        let mut targets: Vec<_> = self
            .backends
            .keys()
            .filter(|(p, k, _)| *p == platform && *k == kind)
            .map(|(_, _, t)| t.clone())
            .collect();
        targets.sort();
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_targets_per_platform() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(
            registry.supported_targets(Platform::Linux, StoreKind::System),
            vec!["ca-certificates", "update-ca-trust"]
        );
        assert_eq!(
            registry.supported_targets(Platform::Windows, StoreKind::System),
            vec!["ca", "my", "root", "trust"]
        );
        assert_eq!(
            registry.supported_targets(Platform::Darwin, StoreKind::Application),
            vec!["docker", "java-cacerts", "pem-directory"]
        );
    }

    #[test]
    fn unknown_target_is_unsupported() {
        let registry = BackendRegistry::with_defaults();
        let target = TrustStoreTarget::new("ff", StoreKind::Application, "firefox", &["linux"]);
        let err = registry.create_store(&target, Platform::Linux).err().unwrap();
        assert!(matches!(err, TsuError::UnsupportedTarget { ref target, .. } if target == "firefox"));
    }

    #[test]
    fn system_target_is_platform_specific() {
        let registry = BackendRegistry::with_defaults();
        let target =
            TrustStoreTarget::new("sys", StoreKind::System, "ca-certificates", &["linux"]);
        assert!(registry.create_store(&target, Platform::Linux).is_ok());
        assert!(registry.create_store(&target, Platform::Windows).is_err());
    }

    #[test]
    fn target_lookup_ignores_case() {
        let registry = BackendRegistry::with_defaults();
        let target = TrustStoreTarget::new("d", StoreKind::Application, "Docker", &["linux"]);
        let store = registry.create_store(&target, Platform::Linux).unwrap();
        assert_eq!(store.name(), "d");
    }

    #[test]
    fn custom_registration_replaces_builtin() {
        let mut registry = BackendRegistry::with_defaults();
        registry.register(Platform::Linux, StoreKind::Application, "docker", |t| {
            Ok(Box::new(AnchorDirStore::new(format!("custom-{}", t.name), "/tmp/custom")))
        });
        let target = TrustStoreTarget::new("d", StoreKind::Application, "docker", &["linux"]);
        let store = registry.create_store(&target, Platform::Linux).unwrap();
        assert_eq!(store.name(), "custom-d");
    }
}
