//! Run configuration: certificate sources, trust store targets and settings.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TsuError};
use crate::types::{CertificateSource, TrustStoreTarget};

/// Config file looked up when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "./trust-store-config.yaml";

/// Whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where new root certificates come from
    #[serde(default)]
    pub certificate_sources: Vec<CertificateSource>,

    /// Stores to reconcile
    #[serde(default)]
    pub trust_stores: Vec<TrustStoreTarget>,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// How certificate subject filters select certificates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectFilterPolicy {
    /// Filters never exclude a certificate; matches are only logged
    #[default]
    Allow,
    /// Keep a certificate only if its subject contains one of the filters
    Deny,
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Snapshot every store before mutating it
    #[serde(default = "default_true")]
    pub backup_enabled: bool,

    /// Where snapshots are written
    #[serde(default = "default_backup_directory")]
    pub backup_directory: PathBuf,

    /// Log filter used when neither `RUST_LOG` nor `--verbose` is set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Extra attempts for retryable url fetch failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout for url fetches
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Run each store's validation after applying changes
    #[serde(default = "default_true")]
    pub validate_after: bool,

    /// Upper bound on concurrent source fetches and store applies
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Subject filter selection policy
    #[serde(default)]
    pub subject_filter_policy: SubjectFilterPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backup_enabled: true,
            backup_directory: default_backup_directory(),
            log_level: default_log_level(),
            max_retries: default_max_retries(),
            timeout_seconds: default_timeout_seconds(),
            validate_after: true,
            max_concurrency: default_max_concurrency(),
            subject_filter_policy: SubjectFilterPolicy::default(),
        }
    }
}

impl Settings {
    /// Per-request fetch timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// Default value functions for serde.
const fn default_true() -> bool {
    true
}

fn default_backup_directory() -> PathBuf {
    PathBuf::from("./backups")
}

fn default_log_level() -> String {
    String::from("info")
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_timeout_seconds() -> u64 {
    30
}

const fn default_max_concurrency() -> usize {
    4
}

impl Config {
    /// Parse a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| TsuError::io(path.display().to_string(), e))?;
        Self::from_yaml(&content)
    }

    /// Write the commented default configuration to `path`.
    ///
    /// Does nothing if the file already exists.
    pub fn write_default(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| TsuError::io(parent.display().to_string(), e))?;
        }
        std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)
            .map_err(|e| TsuError::io(path.display().to_string(), e))
    }

    /// Static checks: something to fetch, somewhere to put it, unique names.
    ///
    /// Creating the backup directory is left to the caller.
    pub fn validate(&self) -> Result<()> {
        if self.certificate_sources.is_empty() {
            return Err(TsuError::Config("no certificate sources configured".into()));
        }
        if self.trust_stores.is_empty() {
            return Err(TsuError::Config("no trust stores configured".into()));
        }
        if self.settings.backup_enabled && self.settings.backup_directory.as_os_str().is_empty() {
            return Err(TsuError::Config(
                "backup directory must be specified when backup is enabled".into(),
            ));
        }

        if self.settings.timeout_seconds == 0 {
            return Err(TsuError::Config("timeout_seconds must be at least 1".into()));
        }
        if self.settings.max_concurrency == 0 {
            return Err(TsuError::Config("max_concurrency must be at least 1".into()));
        }

        let mut seen = HashSet::new();
        for name in self.certificate_sources.iter().map(|s| &s.name) {
            if !seen.insert(name) {
                return Err(TsuError::Config(format!("duplicate certificate source name: {name}")));
            }
        }
        seen.clear();
        for name in self.trust_stores.iter().map(|t| &t.name) {
            if !seen.insert(name) {
                return Err(TsuError::Config(format!("duplicate trust store name: {name}")));
            }
        }

        Ok(())
    }
}

/// Template written by [`Config::write_default`].
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Trust Store Updater Configuration
# This file defines certificate sources and target trust stores to update

# Certificate sources - where to fetch new root certificates from
certificate_sources:
  - name: "mozilla-ca-bundle"
    type: "url"
    source: "https://curl.se/ca/cacert.pem"
    enabled: true
    verify_tls: true
    filters: []

  - name: "local-certificates"
    type: "directory"
    source: "./certificates"
    enabled: false
    filters:
      - "*.crt"
      - "*.pem"

# Trust stores - target stores to update with new certificates
trust_stores:
  # System trust stores
  - name: "system-ca-certificates"
    type: "system"
    platform: ["linux"]
    target: "ca-certificates"
    enabled: true
    require_root: true

  - name: "system-keychain"
    type: "system"
    platform: ["darwin"]
    target: "system-keychain"
    enabled: true
    require_root: true

  - name: "system-cert-store"
    type: "system"
    platform: ["windows"]
    target: "root"
    enabled: true
    require_root: true

  # Application trust stores
  - name: "docker-ca-certificates"
    type: "application"
    platform: ["linux", "darwin", "windows"]
    target: "docker"
    enabled: false
    require_root: false

  - name: "java-cacerts"
    type: "application"
    platform: ["linux", "darwin", "windows"]
    target: "java-cacerts"
    enabled: false
    require_root: false

# Global settings
settings:
  backup_enabled: true
  backup_directory: "./backups"
  log_level: "info"
  max_retries: 3
  timeout_seconds: 30
  validate_after: true
  max_concurrency: 4
  subject_filter_policy: "allow"
"#;
