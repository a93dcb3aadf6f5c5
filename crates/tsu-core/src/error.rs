use thiserror::Error;

/// Result type alias for trust store operations
pub type Result<T> = std::result::Result<T, TsuError>;

/// Errors that can occur while reconciling trust stores
#[derive(Error, Debug)]
pub enum TsuError {
    /// Configuration is invalid, incomplete, or could not be prepared
    #[error("configuration error: {0}")]
    Config(String),

    /// A certificate source could not be fetched
    #[error("failed to fetch source {name}: {reason}")]
    SourceFetch {
        /// Name of the source
        name: String,
        /// What went wrong
        reason: String,
    },

    /// Data was readable but contained no parseable certificate
    #[error("no valid certificates found in {0}")]
    NoCertificates(String),

    /// A single certificate could not be parsed
    #[error("failed to parse certificate from {origin}: {reason}")]
    CertParse {
        /// Where the bytes came from (path, URL, store name)
        origin: String,
        /// Parser message
        reason: String,
    },

    /// HTTP transport failed
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// HTTP request completed with a non-success status
    #[error("HTTP request to {url} failed with status {status}")]
    HttpStatus {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Request timed out
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// A trust store target could not be turned into a usable store
    #[error("store {store} could not be initialized: {reason}")]
    StoreInit {
        /// Configured store name
        store: String,
        /// Why it was excluded
        reason: String,
    },

    /// No backend is registered for this target on this platform
    #[error("unsupported {kind} store target {target} on {platform}")]
    UnsupportedTarget {
        /// Store kind (system / application)
        kind: String,
        /// Backend target identifier
        target: String,
        /// Platform identifier
        platform: String,
    },

    /// An external tool failed
    #[error("command `{program}` failed: {reason}")]
    Command {
        /// Program that was run
        program: String,
        /// Exit status and stderr
        reason: String,
    },

    /// A store backend rejected an operation
    #[error("store error: {0}")]
    Store(String),

    /// Snapshotting a store failed; the run must not mutate anything
    #[error("backup of store {store} to {path} failed")]
    Backup {
        /// Store name
        store: String,
        /// Backup destination
        path: String,
        /// Underlying failure
        #[source]
        source: Box<TsuError>,
    },

    /// A store reported an unusable state after mutation
    #[error("post-update validation failed for store {store}")]
    PostValidation {
        /// Store name
        store: String,
        /// Underlying failure
        #[source]
        source: Box<TsuError>,
    },

    /// Filesystem I/O failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// YAML parsing/serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TsuError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a failure as a fatal backup error.
    pub fn backup(store: impl Into<String>, path: impl Into<String>, source: Self) -> Self {
        Self::Backup {
            store: store.into(),
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure as a fatal post-validation error.
    pub fn post_validation(store: impl Into<String>, source: Self) -> Self {
        Self::PostValidation {
            store: store.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if this error must abort the whole run
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Backup { .. } | Self::PostValidation { .. }
        )
    }

    /// Returns true if repeating the request may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
