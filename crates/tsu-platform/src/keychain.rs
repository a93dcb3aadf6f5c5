//! macOS keychains through the `security` tool.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use tsu_core::{parse_certificates, Certificate, CertificateStore, Result, TrustStoreTarget, TsuError};

use crate::bundle;
use crate::command::{self, TempCertFile};

const SECURITY: &str = "security";
const SYSTEM_KEYCHAIN: &str = "/Library/Keychains/System.keychain";

/// A macOS keychain.
#[derive(Debug, Clone)]
pub struct KeychainStore {
    name: String,
    keychain: PathBuf,
    /// Admin trust settings (`-d`), only valid for the system keychain
    admin: bool,
}

impl KeychainStore {
    /// `/Library/Keychains/System.keychain`, admin trust settings.
    pub fn system(target: &TrustStoreTarget) -> Self {
        Self {
            name: target.name.clone(),
            keychain: target
                .option("keychain")
                .map_or_else(|| PathBuf::from(SYSTEM_KEYCHAIN), PathBuf::from),
            admin: true,
        }
    }

    /// The invoking user's login keychain.
    pub fn login(target: &TrustStoreTarget) -> Result<Self> {
        let keychain = match target.option("keychain") {
            Some(path) => PathBuf::from(path),
            None => {
                let home = std::env::var_os("HOME").ok_or_else(|| TsuError::StoreInit {
                    store: target.name.clone(),
                    reason: "HOME is not set".into(),
                })?;
                PathBuf::from(home).join("Library/Keychains/login.keychain-db")
            }
        };
        Ok(Self {
            name: target.name.clone(),
            keychain,
            admin: false,
        })
    }

    fn keychain_arg(&self) -> String {
        self.keychain.display().to_string()
    }

    fn add_args(&self, file: &Path) -> Vec<String> {
        let mut args = vec!["add-trusted-cert".to_string()];
        if self.admin {
            args.push("-d".into());
        }
        args.extend([
            "-r".into(),
            "trustRoot".into(),
            "-k".into(),
            self.keychain_arg(),
            file.display().to_string(),
        ]);
        args
    }
}

#[async_trait]
impl CertificateStore for KeychainStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_supported(&self) -> bool {
        command::tool_available(SECURITY) && self.keychain.exists()
    }

    fn requires_root(&self) -> bool {
        self.admin
    }

    async fn list_certificates(&self) -> Result<Vec<Certificate>> {
        let out = command::run(SECURITY, ["find-certificate", "-a", "-p", &self.keychain_arg()]).await?;
        match parse_certificates(&out, &self.name) {
            Ok(certs) => Ok(certs.into_iter().map(|c| c.with_origin(&self.name)).collect()),
            Err(TsuError::NoCertificates(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn add_certificate(&self, cert: &Certificate) -> Result<()> {
        let file = TempCertFile::pem(cert).await?;
        command::run(SECURITY, self.add_args(file.path())).await?;
        info!(store = %self.name, subject = %cert.subject, "added certificate to keychain");
        Ok(())
    }

    async fn remove_certificate(&self, cert: &Certificate) -> Result<()> {
        let sha1 = cert.sha1_hex().to_uppercase();
        command::run(SECURITY, ["delete-certificate", "-Z", &sha1, &self.keychain_arg()]).await?;
        info!(store = %self.name, fingerprint = %cert.fingerprint, "removed certificate from keychain");
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
        if !self.keychain.exists() {
            return Err(TsuError::Store(format!(
                "keychain {} is missing",
                self.keychain.display()
            )));
        }
        self.list_certificates().await.map(|_| ())
    }
}
