//! The working set of stores for one run.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use tsu_core::{CertificateStore, Platform, StoreFactory, TrustStoreTarget};

/// Why a configured target is not part of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    PlatformMismatch,
    RequiresRoot,
    /// The factory could not build a backend
    InitFailed(String),
    /// Backend exists but is not usable on this host
    Unsupported,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::PlatformMismatch => write!(f, "not applicable to this platform"),
            Self::RequiresRoot => write!(f, "requires elevated privileges"),
            Self::InitFailed(reason) => write!(f, "initialization failed: {reason}"),
            Self::Unsupported => write!(f, "not supported on this host"),
        }
    }
}

/// A target left out of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedStore {
    pub name: String,
    pub reason: SkipReason,
}

/// A target with its live backend.
pub struct RegisteredStore {
    pub target: TrustStoreTarget,
    pub store: Box<dyn CertificateStore>,
}

impl RegisteredStore {
    /// Configured name (backups and reports use this, not the backend's).
    pub fn name(&self) -> &str {
        &self.target.name
    }
}

/// Enabled, platform-eligible, permission-eligible, supported stores.
///
/// Registered stores keep config order. Nothing here is ever fatal.
#[derive(Default)]
pub struct StoreRegistry {
    stores: Vec<RegisteredStore>,
    skipped: Vec<SkippedStore>,
}

impl StoreRegistry {
    /// Apply the registration policy to every configured target.
    pub fn build(
        targets: &[TrustStoreTarget],
        factory: &dyn StoreFactory,
        platform: Platform,
        privileged: bool,
    ) -> Self {
        let mut registry = Self::default();

        for target in targets {
            match Self::admit(target, factory, platform, privileged) {
                Ok(store) => {
                    info!(store = %target.name, target = %target.target, "initialized store");
                    registry.stores.push(RegisteredStore {
                        target: target.clone(),
                        store,
                    });
                }
                Err(reason) => {
                    debug!(store = %target.name, %reason, "skipping store");
                    registry.skipped.push(SkippedStore {
                        name: target.name.clone(),
                        reason,
                    });
                }
            }
        }

        registry
    }

    fn admit(
        target: &TrustStoreTarget,
        factory: &dyn StoreFactory,
        platform: Platform,
        privileged: bool,
    ) -> Result<Box<dyn CertificateStore>, SkipReason> {
        if !target.enabled {
            return Err(SkipReason::Disabled);
        }
        if !platform.is_listed_in(&target.platform) {
            return Err(SkipReason::PlatformMismatch);
        }
        if target.require_root && !privileged {
            return Err(SkipReason::RequiresRoot);
        }

        let store = factory
            .create_store(target, platform)
            .map_err(|e| SkipReason::InitFailed(e.to_string()))?;
        if !store.is_supported() {
            return Err(SkipReason::Unsupported);
        }
        Ok(store)
    }

    pub fn stores(&self) -> &[RegisteredStore] {
        &self.stores
    }

    pub fn skipped(&self) -> &[SkippedStore] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }
}
