//! Certificate source definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How a source's location is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// HTTP(S) GET of a PEM bundle or DER blob
    Url,
    /// A single local file
    File,
    /// A directory tree, walked recursively
    Directory,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url => write!(f, "url"),
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// Where to fetch candidate root certificates from.
///
/// Loaded once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSource {
    /// Unique name, used in logs and reports
    pub name: String,
    /// Fetch strategy
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// URL, file path or directory path
    #[serde(rename = "source")]
    pub location: String,
    /// Disabled sources are skipped
    #[serde(default)]
    pub enabled: bool,
    /// Verify the server certificate on url fetches
    #[serde(default = "default_true")]
    pub verify_tls: bool,
    /// Extra request headers for url fetches
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// File-name globs (directory) and subject substrings (all kinds)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
}

const fn default_true() -> bool {
    true
}

impl CertificateSource {
    /// Minimal enabled source, handy for tests and programmatic configs.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: SourceKind, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            location: location.into(),
            enabled: true,
            verify_tls: true,
            headers: HashMap::new(),
            filters: Vec::new(),
        }
    }
}
