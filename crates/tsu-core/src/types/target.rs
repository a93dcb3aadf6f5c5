//! Trust store target definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Backend category of a trust store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Operating-system trust store
    System,
    /// Application-specific trust store (Docker, Java, ...)
    Application,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Application => write!(f, "application"),
        }
    }
}

/// A trust store to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustStoreTarget {
    /// Unique name, used in logs, reports and backup file names
    pub name: String,
    /// Backend category
    #[serde(rename = "type")]
    pub kind: StoreKind,
    /// Platform identifiers this target applies to (`linux`, `darwin`, `windows`)
    #[serde(default)]
    pub platform: Vec<String>,
    /// Backend-specific target identifier (`ca-certificates`, `docker`, ...)
    pub target: String,
    /// Disabled targets are skipped
    #[serde(default)]
    pub enabled: bool,
    /// Only register when running with elevated privileges
    #[serde(default)]
    pub require_root: bool,
    /// Backend options
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub options: HashMap<String, String>,
}

impl TrustStoreTarget {
    /// Minimal enabled target, handy for tests and programmatic configs.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: StoreKind,
        target: impl Into<String>,
        platforms: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            platform: platforms.iter().map(|p| (*p).to_string()).collect(),
            target: target.into(),
            enabled: true,
            require_root: false,
            options: HashMap::new(),
        }
    }

    /// Look up a backend option.
    #[must_use]
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}
