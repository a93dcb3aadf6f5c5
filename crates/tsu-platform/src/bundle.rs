//! PEM bundle snapshots for stores that are only reachable through a tool.

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use tsu_core::{parse_certificates, Certificate, CertificateStore, Result, TsuError};

/// File name of the bundle inside a backup directory.
pub const BUNDLE_FILE: &str = "certificates.pem";

/// Write `certs` as one PEM bundle into the backup directory `dir`.
pub async fn write_bundle(dir: &Path, certs: &[Certificate]) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| TsuError::io(dir.display().to_string(), e))?;

    let path = dir.join(BUNDLE_FILE);
    let body: String = certs.iter().map(Certificate::to_pem).collect();
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| TsuError::io(path.display().to_string(), e))?;

    debug!(path = %path.display(), count = certs.len(), "wrote certificate bundle");
    Ok(())
}

/// Read a bundle written by [`write_bundle`]. An empty bundle is an empty store.
pub async fn read_bundle(dir: &Path) -> Result<Vec<Certificate>> {
    let path = dir.join(BUNDLE_FILE);
    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| TsuError::io(path.display().to_string(), e))?;

    match parse_certificates(&data, &path.display().to_string()) {
        Ok(certs) => Ok(certs),
        Err(TsuError::NoCertificates(_)) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Make `store` hold exactly `snapshot`: remove extras, re-add missing.
///
/// Every certificate is attempted; the error reports how many failed.
pub async fn restore_snapshot(store: &dyn CertificateStore, snapshot: &[Certificate]) -> Result<()> {
    let current = store.list_certificates().await?;
    let wanted: HashSet<_> = snapshot.iter().map(|c| &c.fingerprint).collect();
    let present: HashSet<_> = current.iter().map(|c| &c.fingerprint).collect();

    let mut failures = 0usize;
    for cert in current.iter().filter(|c| !wanted.contains(&c.fingerprint)) {
        if let Err(e) = store.remove_certificate(cert).await {
            warn!(store = store.name(), fingerprint = %cert.fingerprint, error = %e, "restore: remove failed");
            failures += 1;
        }
    }
    for cert in snapshot.iter().filter(|c| !present.contains(&c.fingerprint)) {
        if let Err(e) = store.add_certificate(cert).await {
            warn!(store = store.name(), fingerprint = %cert.fingerprint, error = %e, "restore: add failed");
            failures += 1;
        }
    }

    if failures > 0 {
        return Err(TsuError::Store(format!(
            "restore of {} left {failures} certificate(s) unreconciled",
            store.name()
        )));
    }
    Ok(())
}
