//! Stores backed by a directory of PEM files.
//!
//! Covers the Debian and Red Hat system anchor directories (with their
//! refresh tools) as well as plain application directories such as
//! Docker's `certs.d`.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use tsu_core::{
    is_elevated, parse_certificates, Certificate, CertificateStore, Result, TrustStoreTarget,
    TsuError,
};

use crate::command;

/// Option value that disables the refresh command.
const NO_REFRESH: &str = "none";

/// A trust store that is a directory of certificate files.
#[derive(Debug, Clone)]
pub struct AnchorDirStore {
    name: String,
    /// Where new certificates are written
    anchor_dir: PathBuf,
    /// Where current contents are read from (often the generated output dir)
    list_dir: PathBuf,
    /// Command rebuilding the generated trust bundle after a change
    refresh: Option<String>,
    requires_root: bool,
}

impl AnchorDirStore {
    pub fn new(name: impl Into<String>, anchor_dir: impl Into<PathBuf>) -> Self {
        let anchor_dir = anchor_dir.into();
        Self {
            name: name.into(),
            list_dir: anchor_dir.clone(),
            anchor_dir,
            refresh: None,
            requires_root: false,
        }
    }

    #[must_use]
    pub fn with_list_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.list_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_refresh(mut self, command: impl Into<String>) -> Self {
        let command = command.into();
        self.refresh = (command.trim() != NO_REFRESH && !command.trim().is_empty()).then_some(command);
        self
    }

    #[must_use]
    pub const fn with_requires_root(mut self, requires_root: bool) -> Self {
        self.requires_root = requires_root;
        self
    }

    /// Apply `anchor_dir`, `list_dir` and `refresh_command` target options.
    #[must_use]
    pub fn with_options(mut self, target: &TrustStoreTarget) -> Self {
        if let Some(dir) = target.option("anchor_dir") {
            self.anchor_dir = PathBuf::from(dir);
        }
        if let Some(dir) = target.option("list_dir") {
            self.list_dir = PathBuf::from(dir);
        }
        if let Some(cmd) = target.option("refresh_command") {
            self = self.with_refresh(cmd);
        }
        self
    }

    /// Debian family: `/usr/local/share/ca-certificates` + `update-ca-certificates`.
    pub fn ca_certificates(target: &TrustStoreTarget) -> Self {
        Self::new(target.name.clone(), "/usr/local/share/ca-certificates")
            .with_list_dir("/etc/ssl/certs")
            .with_refresh("update-ca-certificates")
            .with_requires_root(true)
            .with_options(target)
    }

    /// Red Hat family: `/etc/pki/ca-trust/source/anchors` + `update-ca-trust extract`.
    pub fn update_ca_trust(target: &TrustStoreTarget) -> Self {
        Self::new(target.name.clone(), "/etc/pki/ca-trust/source/anchors")
            .with_refresh("update-ca-trust extract")
            .with_requires_root(true)
            .with_options(target)
    }

    /// Docker daemon registry CAs, optionally scoped by the `registry` option.
    pub fn docker(target: &TrustStoreTarget) -> Self {
        let mut dir = PathBuf::from("/etc/docker/certs.d");
        if let Some(registry) = target.option("registry") {
            dir.push(registry);
        }
        Self::new(target.name.clone(), dir)
            .with_requires_root(true)
            .with_options(target)
    }

    /// Arbitrary directory given by the `path` option.
    pub fn pem_directory(target: &TrustStoreTarget) -> Result<Self> {
        let path = target.option("path").ok_or_else(|| TsuError::StoreInit {
            store: target.name.clone(),
            reason: "pem-directory requires a `path` option".into(),
        })?;
        Ok(Self::new(target.name.clone(), path).with_options(target))
    }

    pub fn anchor_dir(&self) -> &Path {
        &self.anchor_dir
    }

    fn cert_path(&self, cert: &Certificate) -> PathBuf {
        self.anchor_dir.join(format!("{}.crt", cert.file_stem()))
    }

    async fn refresh(&self) -> Result<()> {
        if let Some(cmd) = &self.refresh {
            command::run_line(cmd).await?;
            debug!(store = %self.name, command = %cmd, "refreshed trust bundle");
        }
        Ok(())
    }
}

/// Regular files (or symlinks to them) under `dir`.
fn files_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Like [`files_under`], but any unreadable entry is an error. A missing
/// `dir` has no files.
fn all_files_under(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            let at = e.path().unwrap_or(dir).display().to_string();
            TsuError::Store(format!("cannot read {at}: {e}"))
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

async fn read_certs(path: &Path) -> Option<Vec<Certificate>> {
    let data = tokio::fs::read(path).await.ok()?;
    parse_certificates(&data, &path.display().to_string()).ok()
}

/// Copy every file under `src` into `dst`, keeping relative paths.
///
/// Fails if any part of `src` cannot be read, so a partial copy is never
/// reported as complete.
async fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    let io = |p: &Path, e| TsuError::io(p.display().to_string(), e);

    let root = src.to_path_buf();
    let files = tokio::task::spawn_blocking(move || all_files_under(&root))
        .await
        .map_err(|e| TsuError::Store(format!("directory walk failed: {e}")))??;

    tokio::fs::create_dir_all(dst).await.map_err(|e| io(dst, e))?;
    let mut copied = 0;
    for file in files {
        let Ok(rel) = file.strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| io(parent, e))?;
        }
        tokio::fs::copy(&file, &target).await.map_err(|e| io(&file, e))?;
        copied += 1;
    }
    Ok(copied)
}

#[async_trait]
impl CertificateStore for AnchorDirStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_supported(&self) -> bool {
        let tool_ok = self.refresh.as_deref().map_or(true, |cmd| {
            shell_words::split(cmd)
                .ok()
                .and_then(|parts| parts.into_iter().next())
                .is_some_and(|program| command::tool_available(&program))
        });
        let dir_ok = self.anchor_dir.is_dir()
            || self.anchor_dir.parent().is_some_and(Path::is_dir);
        tool_ok && dir_ok
    }

    fn requires_root(&self) -> bool {
        self.requires_root
    }

    async fn list_certificates(&self) -> Result<Vec<Certificate>> {
        if !self.list_dir.exists() {
            return Ok(Vec::new());
        }
        if !self.list_dir.is_dir() {
            return Err(TsuError::Store(format!(
                "{} is not a directory",
                self.list_dir.display()
            )));
        }

        let mut seen = HashSet::new();
        let mut certs = Vec::new();
        for file in files_under(&self.list_dir) {
            match read_certs(&file).await {
                Some(found) => certs.extend(
                    found
                        .into_iter()
                        .filter(|c| seen.insert(c.fingerprint.clone()))
                        .map(|c| c.with_origin(&self.name)),
                ),
                None => debug!(store = %self.name, path = %file.display(), "no certificate in file"),
            }
        }
        Ok(certs)
    }

    async fn add_certificate(&self, cert: &Certificate) -> Result<()> {
        tokio::fs::create_dir_all(&self.anchor_dir)
            .await
            .map_err(|e| TsuError::io(self.anchor_dir.display().to_string(), e))?;

        let path = self.cert_path(cert);
        tokio::fs::write(&path, cert.to_pem())
            .await
            .map_err(|e| TsuError::io(path.display().to_string(), e))?;
        info!(store = %self.name, path = %path.display(), subject = %cert.subject, "installed certificate");

        self.refresh().await
    }

    async fn remove_certificate(&self, cert: &Certificate) -> Result<()> {
        let mut removed = 0;
        for file in files_under(&self.anchor_dir) {
            let holds = read_certs(&file)
                .await
                .is_some_and(|found| found.iter().any(|c| c.fingerprint == cert.fingerprint));
            if holds {
                tokio::fs::remove_file(&file)
                    .await
                    .map_err(|e| TsuError::io(file.display().to_string(), e))?;
                removed += 1;
            }
        }

        if removed == 0 {
            return Err(TsuError::Store(format!(
                "certificate {} not found in {}",
                cert.fingerprint.short(),
                self.anchor_dir.display()
            )));
        }
        info!(store = %self.name, fingerprint = %cert.fingerprint, "removed certificate");
        self.refresh().await
    }

    async fn backup(&self, path: &Path) -> Result<()> {
        let copied = copy_tree(&self.anchor_dir, path).await?;
        info!(store = %self.name, path = %path.display(), files = copied, "backed up anchor directory");
        Ok(())
    }

    async fn restore(&self, path: &Path) -> Result<()> {
        if !path.is_dir() {
            return Err(TsuError::Store(format!(
                "backup {} is not a directory",
                path.display()
            )));
        }

        for file in files_under(&self.anchor_dir) {
            if let Err(e) = tokio::fs::remove_file(&file).await {
                warn!(store = %self.name, path = %file.display(), error = %e, "could not remove file during restore");
            }
        }
        let copied = copy_tree(path, &self.anchor_dir).await?;
        info!(store = %self.name, path = %path.display(), files = copied, "restored anchor directory");

        self.refresh().await
    }

    async fn validate(&self) -> Result<()> {
        if self.requires_root && !is_elevated() {
            return Err(TsuError::Store(format!(
                "{} requires elevated privileges",
                self.name
            )));
        }
        if !self.is_supported() {
            return Err(TsuError::Store(format!(
                "{} is no longer usable on this host",
                self.name
            )));
        }
        self.list_certificates().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ca;
    use tsu_core::StoreKind;

    fn store(dir: &Path) -> AnchorDirStore {
        AnchorDirStore::new("test-dir", dir.join("anchors"))
    }

    #[tokio::test]
    async fn missing_directory_lists_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(store(tmp.path()).list_certificates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_then_list_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let a = ca("Alpha Root");
        let b = ca("Beta Root");

        store.add_certificate(&a).await.unwrap();
        store.add_certificate(&b).await.unwrap();
        assert!(store.anchor_dir().join(format!("{}.crt", a.file_stem())).is_file());

        let listed = store.list_certificates().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|c| c.origin == "test-dir"));

        store.remove_certificate(&a).await.unwrap();
        assert_eq!(store.list_certificates().await.unwrap(), vec![b]);
        assert!(store.remove_certificate(&a).await.is_err());
    }

    #[tokio::test]
    async fn listing_dedups_bundle_and_single_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("anchors");
        std::fs::create_dir_all(&dir).unwrap();
        let a = ca("Alpha Root");
        let b = ca("Beta Root");
        std::fs::write(dir.join("bundle.crt"), format!("{}{}", a.to_pem(), b.to_pem())).unwrap();
        std::fs::write(dir.join("alpha.pem"), a.to_pem()).unwrap();
        std::fs::write(dir.join("README"), "not a cert").unwrap();

        assert_eq!(store(tmp.path()).list_certificates().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn backup_and_restore_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let a = ca("Alpha Root");
        let b = ca("Beta Root");
        store.add_certificate(&a).await.unwrap();

        let snap = tmp.path().join("backups").join("test-dir_backup_1");
        store.backup(&snap).await.unwrap();
        store.add_certificate(&b).await.unwrap();
        assert_eq!(store.list_certificates().await.unwrap().len(), 2);

        store.restore(&snap).await.unwrap();
        assert_eq!(store.list_certificates().await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn refresh_failure_surfaces_on_add() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path()).with_refresh("tsu-missing-refresh-tool");
        assert!(!store.is_supported());
        let err = store.add_certificate(&ca("Alpha Root")).await.unwrap_err();
        assert!(matches!(err, TsuError::Command { .. }));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn refresh_command_keeps_quoted_arguments() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("refreshed marker");
        let store = store(tmp.path()).with_refresh(&format!("touch '{}'", marker.display()));

        store.add_certificate(&ca("Alpha Root")).await.unwrap();
        assert!(marker.is_file());
        assert!(store.is_supported());
    }

    #[test]
    fn options_override_defaults() {
        let mut target =
            TrustStoreTarget::new("sys", StoreKind::System, "ca-certificates", &["linux"]);
        target.options.insert("anchor_dir".into(), "/tmp/anchors".into());
        target.options.insert("refresh_command".into(), "none".into());

        let store = AnchorDirStore::ca_certificates(&target);
        assert_eq!(store.anchor_dir(), Path::new("/tmp/anchors"));
        assert_eq!(store.list_dir, PathBuf::from("/etc/ssl/certs"));
        assert!(store.refresh.is_none());
        assert!(store.requires_root());
    }

    #[test]
    fn pem_directory_needs_path() {
        let target = TrustStoreTarget::new("pem", StoreKind::Application, "pem-directory", &["linux"]);
        assert!(matches!(
            AnchorDirStore::pem_directory(&target),
            Err(TsuError::StoreInit { .. })
        ));
    }

    #[test]
    fn docker_registry_scopes_directory() {
        let mut target = TrustStoreTarget::new("d", StoreKind::Application, "docker", &["linux"]);
        target.options.insert("registry".into(), "registry.example:5000".into());
        let store = AnchorDirStore::docker(&target);
        assert_eq!(
            store.anchor_dir(),
            Path::new("/etc/docker/certs.d/registry.example:5000")
        );
    }

    #[tokio::test]
    async fn backup_of_missing_anchor_dir_is_empty_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let snap = tmp.path().join("snap");
        store(tmp.path()).backup(&snap).await.unwrap();
        assert!(snap.is_dir());
        assert_eq!(std::fs::read_dir(&snap).unwrap().count(), 0);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn backup_fails_on_unreadable_subdirectory() {
        use std::os::unix::fs::PermissionsExt;

        // Permission bits do not stop root.
        if is_elevated() {
            return;
        }

        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        store.add_certificate(&ca("Readable Root")).await.unwrap();
        let hidden = store.anchor_dir().join("hidden");
        std::fs::create_dir(&hidden).unwrap();
        std::fs::write(hidden.join("extra.crt"), ca("Hidden Root").to_pem()).unwrap();
        std::fs::set_permissions(&hidden, std::fs::Permissions::from_mode(0o000)).unwrap();

        let result = store.backup(&tmp.path().join("snap")).await;
        std::fs::set_permissions(&hidden, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = result.unwrap_err();
        assert!(matches!(err, TsuError::Store(ref m) if m.contains("hidden")), "{err}");
    }
}
