//! Source fetcher implementation.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use tsu_core::{
    parse_certificates, Certificate, CertificateSource, Result, Settings, SourceFetcher,
    SourceKind, TsuError,
};

use crate::filter::FileFilter;
use crate::retry::RetryPolicy;

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches certificates from url, file and directory sources.
///
/// Holds two HTTP clients so each url source can choose whether the
/// server certificate is verified.
#[derive(Clone)]
pub struct Fetcher {
    verified: HttpClient,
    unverified: HttpClient,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Fetcher {
    /// Fetcher configured from run settings (timeout, retries).
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::builder()
            .timeout(settings.timeout())
            .retry(RetryPolicy::new().max_retries(settings.max_retries))
            .build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::new()
    }

    /// GET a url source and parse the body.
    pub async fn fetch_url(&self, source: &CertificateSource) -> Result<Vec<Certificate>> {
        let url = url::Url::parse(&source.location).map_err(|e| TsuError::SourceFetch {
            name: source.name.clone(),
            reason: format!("invalid URL {}: {e}", source.location),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TsuError::SourceFetch {
                name: source.name.clone(),
                reason: format!("unsupported URL scheme: {}", url.scheme()),
            });
        }

        let client = if source.verify_tls {
            &self.verified
        } else {
            warn!(source = %source.name, "TLS verification disabled for source");
            &self.unverified
        };

        let body = tokio::time::timeout(self.timeout, self.get_with_retries(client, source, &url))
            .await
            .map_err(|_| {
                warn!(source = %source.name, timeout_secs = self.timeout.as_secs(), "source fetch timed out");
                TsuError::Timeout(self.timeout.as_secs())
            })??;

        Ok(parse_certificates(&body, url.as_str())?
            .into_iter()
            .map(|c| c.with_origin(&source.name))
            .collect())
    }

    /// Retry loop. The caller bounds its total duration.
    async fn get_with_retries(
        &self,
        client: &HttpClient,
        source: &CertificateSource,
        url: &url::Url,
    ) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            match self.get_once(client, source, url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        source = %source.name,
                        attempt = attempt + 1,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "retrying fetch"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(
        &self,
        client: &HttpClient,
        source: &CertificateSource,
        url: &url::Url,
    ) -> Result<Vec<u8>> {
        debug!(source = %source.name, url = %url, "GET request");

        let mut request = client.get(url.clone());
        for (key, value) in &source.headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|e| self.http_error(&e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TsuError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.http_error(&e))?;
        Ok(body.to_vec())
    }

    fn http_error(&self, e: &reqwest::Error) -> TsuError {
        if e.is_timeout() {
            TsuError::Timeout(self.timeout.as_secs())
        } else {
            TsuError::Http(e.to_string())
        }
    }

    /// Read one file and parse every certificate in it.
    pub async fn fetch_file(&self, path: &Path, origin: &str) -> Result<Vec<Certificate>> {
        let path_str = path.display().to_string();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| TsuError::io(&path_str, e))?;

        Ok(parse_certificates(&data, &path_str)?
            .into_iter()
            .map(|c| c.with_origin(origin))
            .collect())
    }

    /// Walk a directory tree and parse every file whose name passes `filters`.
    ///
    /// Files that cannot be read or contain no certificate are skipped.
    pub async fn fetch_directory(
        &self,
        dir: &Path,
        filters: &[String],
        origin: &str,
    ) -> Result<Vec<Certificate>> {
        let dir_str = dir.display().to_string();
        let filter = FileFilter::new(filters)?;

        let root = dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || matching_files(&root, &filter))
            .await
            .map_err(|e| TsuError::SourceFetch {
                name: origin.to_string(),
                reason: format!("directory walk failed: {e}"),
            })?
            .ok_or_else(|| TsuError::SourceFetch {
                name: origin.to_string(),
                reason: format!("{dir_str} is not a directory"),
            })?;

        let mut certs = Vec::new();
        for path in files {
            match self.fetch_file(&path, origin).await {
                Ok(found) => certs.extend(found),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping certificate file"),
            }
        }

        if certs.is_empty() {
            return Err(TsuError::NoCertificates(dir_str));
        }
        Ok(certs)
    }
}

/// Regular files under `dir` whose names pass `filter`, or `None` when
/// `dir` is not a directory. Blocking.
fn matching_files(dir: &Path, filter: &FileFilter) -> Option<Vec<PathBuf>> {
    if !dir.is_dir() {
        return None;
    }
    let files = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file() || (e.path_is_symlink() && e.path().is_file()))
        .filter(|e| filter.matches(&e.file_name().to_string_lossy()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    Some(files)
}

#[async_trait]
impl SourceFetcher for Fetcher {
    async fn fetch(&self, source: &CertificateSource) -> Result<Vec<Certificate>> {
        info!(source = %source.name, kind = %source.kind, location = %source.location, "fetching certificates");

        let certs = match source.kind {
            SourceKind::Url => self.fetch_url(source).await?,
            SourceKind::File => {
                self.fetch_file(Path::new(&source.location), &source.name)
                    .await?
            }
            SourceKind::Directory => {
                self.fetch_directory(Path::new(&source.location), &source.filters, &source.name)
                    .await?
            }
        };

        debug!(source = %source.name, count = certs.len(), "fetched certificates");
        Ok(certs)
    }
}

/// Builder for configuring a [`Fetcher`]
pub struct FetcherBuilder {
    timeout: Duration,
    user_agent: String,
    retry: RetryPolicy,
}

impl Default for FetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FetcherBuilder {
    /// Create a new builder with default settings
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("trust-store-updater/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the per-source timeout, covering every attempt and backoff
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Set retry policy
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Build the fetcher
    ///
    /// # Errors
    ///
    /// Returns `TsuError::Http` if the TLS backend cannot be initialized.
    pub fn build(self) -> Result<Fetcher> {
        let client = |verify: bool| {
            HttpClient::builder()
                .timeout(self.timeout)
                .user_agent(&self.user_agent)
                .gzip(true)
                .danger_accept_invalid_certs(!verify)
                .build()
                .map_err(|e| TsuError::Http(format!("failed to build HTTP client: {e}")))
        };

        Ok(Fetcher {
            verified: client(true)?,
            unverified: client(false)?,
            timeout: self.timeout,
            retry: self.retry,
        })
    }
}
