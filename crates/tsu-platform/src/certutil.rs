//! Windows `LocalMachine` certificate stores.
//!
//! Mutations go through `certutil`; listing reads the `Cert:` drive via
//! PowerShell, one base64 DER blob per line.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::{debug, info};

use tsu_core::{Certificate, CertificateStore, Result, TrustStoreTarget, TsuError};

use crate::bundle;
use crate::command::{self, TempCertFile};

const CERTUTIL: &str = "certutil";
const POWERSHELL: &str = "powershell";

/// One of the `LocalMachine` physical stores.
#[derive(Debug, Clone)]
pub struct WindowsStore {
    name: String,
    /// Store name as `certutil` and the `Cert:` drive know it (`Root`, `CA`, ...)
    store: &'static str,
}

impl WindowsStore {
    /// Map a config target id (`root`, `ca`, `my`, `trust`) to a store.
    pub fn new(target: &TrustStoreTarget) -> Result<Self> {
        let store = match target.target.to_lowercase().as_str() {
            "root" => "Root",
            "ca" => "CA",
            "my" => "My",
            "trust" => "Trust",
            other => {
                return Err(TsuError::StoreInit {
                    store: target.name.clone(),
                    reason: format!("unknown Windows certificate store: {other}"),
                })
            }
        };
        Ok(Self {
            name: target.name.clone(),
            store,
        })
    }

    fn list_script(&self) -> String {
        format!(
            "Get-ChildItem Cert:\\LocalMachine\\{} | ForEach-Object {{ [Convert]::ToBase64String($_.RawData) }}",
            self.store
        )
    }
}

/// Decode one certificate per non-empty base64 line; undecodable lines are skipped.
fn decode_listing(out: &[u8], origin: &str) -> Vec<Certificate> {
    String::from_utf8_lossy(out)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let der = STANDARD
                .decode(line)
                .map_err(|e| debug!(origin, error = %e, "skipping undecodable line"))
                .ok()?;
            Certificate::from_der(&der, origin)
                .map_err(|e| debug!(origin, error = %e, "skipping unparseable certificate"))
                .ok()
        })
        .collect()
}

#[async_trait]
impl CertificateStore for WindowsStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_supported(&self) -> bool {
        command::tool_available(CERTUTIL) && command::tool_available(POWERSHELL)
    }

    fn requires_root(&self) -> bool {
        true
    }

    async fn list_certificates(&self) -> Result<Vec<Certificate>> {
        let out = command::run(
            POWERSHELL,
            ["-NoProfile", "-NonInteractive", "-Command", &self.list_script()],
        )
        .await?;
        Ok(decode_listing(&out, &self.name))
    }

    async fn add_certificate(&self, cert: &Certificate) -> Result<()> {
        let file = TempCertFile::der(cert).await?;
        let path = file.path().display().to_string();
        command::run(CERTUTIL, ["-addstore", "-f", self.store, &path]).await?;
        info!(store = %self.name, subject = %cert.subject, "added certificate to {}", self.store);
        Ok(())
    }

    async fn remove_certificate(&self, cert: &Certificate) -> Result<()> {
        command::run(CERTUTIL, ["-delstore", self.store, &cert.sha1_hex()]).await?;
        info!(store = %self.name, fingerprint = %cert.fingerprint, "removed certificate from {}", self.store);
        Ok(())
    }

    async fn backup(&self, path: &Path) -> Result<()> {
        let certs = self.list_certificates().await?;
        bundle::write_bundle(path, &certs).await
    }

    async fn restore(&self, path: &Path) -> Result<()> {
        let snapshot = bundle::read_bundle(path).await?;
        bundle::restore_snapshot(self, &snapshot).await
    }

    async fn validate(&self) -> Result<()> {
        self.list_certificates().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ca;
    use tsu_core::StoreKind;

    #[test]
    fn maps_target_ids() {
        let target = TrustStoreTarget::new("w", StoreKind::System, "ROOT", &["windows"]);
        assert_eq!(WindowsStore::new(&target).unwrap().store, "Root");

        let target = TrustStoreTarget::new("w", StoreKind::System, "disallowed", &["windows"]);
        assert!(WindowsStore::new(&target).is_err());
    }

    #[test]
    fn list_script_targets_local_machine() {
        let target = TrustStoreTarget::new("w", StoreKind::System, "ca", &["windows"]);
        let script = WindowsStore::new(&target).unwrap().list_script();
        assert!(script.starts_with("Get-ChildItem Cert:\\LocalMachine\\CA |"));
    }

    #[test]
    fn decodes_base64_listing() {
        let a = ca("Alpha Root");
        let b = ca("Beta Root");
        let out = format!(
            "{}\r\n\r\nnot-base64!!\r\n{}\r\n",
            STANDARD.encode(&a.der),
            STANDARD.encode(&b.der)
        );
        let certs = decode_listing(out.as_bytes(), "w");
        assert_eq!(certs, vec![a, b]);
    }
}
