//! Java `cacerts` keystore through `keytool`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use tsu_core::{
    parse_certificates, Certificate, CertificateStore, Fingerprint, Result, TrustStoreTarget,
    TsuError,
};

use crate::command::{self, TempCertFile};

const KEYTOOL: &str = "keytool";
const DEFAULT_STOREPASS: &str = "changeit";
const BACKUP_FILE: &str = "cacerts";
const ALIAS_PREFIX: &str = "Alias name:";
/// keytool reads the password from this variable via `-storepass:env`.
const STOREPASS_ENV: &str = "TSU_KEYTOOL_STOREPASS";

/// The JVM-wide trusted CA keystore.
#[derive(Debug, Clone)]
pub struct JavaCacertsStore {
    name: String,
    keytool: String,
    keystore: PathBuf,
    storepass: String,
}

impl JavaCacertsStore {
    /// Options: `keystore` (default `$JAVA_HOME/lib/security/cacerts`),
    /// `storepass` (default `changeit`), `keytool` (default from `PATH`
    /// or `$JAVA_HOME/bin`).
    pub fn new(target: &TrustStoreTarget) -> Result<Self> {
        let java_home = std::env::var_os("JAVA_HOME").map(PathBuf::from);

        let keystore = match (target.option("keystore"), &java_home) {
            (Some(path), _) => PathBuf::from(path),
            (None, Some(home)) => home.join("lib").join("security").join("cacerts"),
            (None, None) => {
                return Err(TsuError::StoreInit {
                    store: target.name.clone(),
                    reason: "no `keystore` option and JAVA_HOME is not set".into(),
                })
            }
        };

        let keytool = target.option("keytool").map_or_else(
            || match &java_home {
                Some(home) if !command::tool_available(KEYTOOL) => {
                    home.join("bin").join(KEYTOOL).display().to_string()
                }
                _ => KEYTOOL.to_string(),
            },
            str::to_string,
        );

        Ok(Self {
            name: target.name.clone(),
            keytool,
            keystore,
            storepass: target
                .option("storepass")
                .unwrap_or(DEFAULT_STOREPASS)
                .to_string(),
        })
    }

    fn keystore_args(&self) -> [String; 4] {
        [
            "-keystore".into(),
            self.keystore.display().to_string(),
            "-storepass:env".into(),
            STOREPASS_ENV.into(),
        ]
    }

    /// Run keytool against the keystore. The password travels in the
    /// child's environment, never on its command line.
    async fn keytool(&self, mut args: Vec<String>) -> Result<Vec<u8>> {
        args.extend(self.keystore_args());
        command::run_with_env(&self.keytool, args, [(STOREPASS_ENV, &self.storepass)]).await
    }

    async fn listing(&self) -> Result<Vec<u8>> {
        self.keytool(vec!["-list".to_string(), "-rfc".into()]).await
    }
}

/// Split `keytool -list -rfc` output into (alias, certificate) pairs.
fn parse_listing(out: &[u8], origin: &str) -> Vec<(String, Certificate)> {
    let text = String::from_utf8_lossy(out);
    let mut entries = Vec::new();

    for section in text.split(ALIAS_PREFIX).skip(1) {
        let Some((alias, body)) = section.split_once('\n') else {
            continue;
        };
        let alias = alias.trim().to_string();
        match parse_certificates(body.as_bytes(), origin) {
            Ok(certs) => entries.extend(certs.into_iter().map(|c| (alias.clone(), c))),
            Err(e) => debug!(origin, alias = %alias, error = %e, "keystore entry holds no certificate"),
        }
    }
    entries
}

/// Alias used for certificates this tool imports.
fn alias_for(fingerprint: &Fingerprint) -> String {
    format!("tsu-{}", fingerprint.short())
}

#[async_trait]
impl CertificateStore for JavaCacertsStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_supported(&self) -> bool {
        (command::tool_available(&self.keytool) || Path::new(&self.keytool).is_file())
            && self.keystore.is_file()
    }

    fn requires_root(&self) -> bool {
        true
    }

    async fn list_certificates(&self) -> Result<Vec<Certificate>> {
        let out = self.listing().await?;
        Ok(parse_listing(&out, &self.name)
            .into_iter()
            .map(|(_, c)| c)
            .collect())
    }

    async fn add_certificate(&self, cert: &Certificate) -> Result<()> {
        let file = TempCertFile::pem(cert).await?;
        let args = vec![
            "-importcert".to_string(),
            "-noprompt".into(),
            "-trustcacerts".into(),
            "-alias".into(),
            alias_for(&cert.fingerprint),
            "-file".into(),
            file.path().display().to_string(),
        ];
        self.keytool(args).await?;
        info!(store = %self.name, subject = %cert.subject, "imported certificate into keystore");
        Ok(())
    }

    async fn remove_certificate(&self, cert: &Certificate) -> Result<()> {
        let out = self.listing().await?;
        let aliases: HashMap<_, _> = parse_listing(&out, &self.name)
            .into_iter()
            .map(|(alias, c)| (c.fingerprint, alias))
            .collect();
        let alias = aliases.get(&cert.fingerprint).ok_or_else(|| {
            TsuError::Store(format!(
                "certificate {} not found in {}",
                cert.fingerprint.short(),
                self.keystore.display()
            ))
        })?;

        self.keytool(vec!["-delete".to_string(), "-alias".into(), alias.clone()])
            .await?;
        info!(store = %self.name, alias = %alias, "deleted keystore entry");
        Ok(())
    }

    async fn backup(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| TsuError::io(path.display().to_string(), e))?;
        tokio::fs::copy(&self.keystore, path.join(BACKUP_FILE))
            .await
            .map_err(|e| TsuError::io(self.keystore.display().to_string(), e))?;
        info!(store = %self.name, path = %path.display(), "backed up keystore");
        Ok(())
    }

    async fn restore(&self, path: &Path) -> Result<()> {
        let saved = path.join(BACKUP_FILE);
        tokio::fs::copy(&saved, &self.keystore)
            .await
            .map_err(|e| TsuError::io(saved.display().to_string(), e))?;
        info!(store = %self.name, path = %path.display(), "restored keystore");
        Ok(())
    }

    async fn validate(&self) -> Result<()> {
        self.listing().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ca;
    use tsu_core::StoreKind;

    fn target(keystore: &Path) -> TrustStoreTarget {
        let mut target =
            TrustStoreTarget::new("java", StoreKind::Application, "java-cacerts", &["linux"]);
        target
            .options
            .insert("keystore".into(), keystore.display().to_string());
        target
    }

    #[test]
    fn parses_rfc_listing_with_aliases() {
        let a = ca("Alpha Root");
        let b = ca("Beta Root");
        let out = format!(
            "Keystore type: PKCS12\nKeystore provider: SUN\n\nYour keystore contains 2 entries\n\n\
             Alias name: alpha\nCreation date: Jan 1, 2024\nEntry type: trustedCertEntry\n\n{}\n\n\
             *******************************************\n\n\
             Alias name: tsu-beta\nCreation date: Jan 1, 2024\nEntry type: trustedCertEntry\n\n{}\n",
            a.to_pem(),
            b.to_pem()
        );

        let entries = parse_listing(out.as_bytes(), "java");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "alpha");
        assert_eq!(entries[0].1, a);
        assert_eq!(entries[1].0, "tsu-beta");
        assert_eq!(entries[1].1, b);
    }

    #[test]
    fn options_and_defaults() {
        let store = JavaCacertsStore::new(&target(Path::new("/opt/jdk/cacerts"))).unwrap();
        assert_eq!(store.keystore, PathBuf::from("/opt/jdk/cacerts"));
        assert_eq!(store.storepass, DEFAULT_STOREPASS);
        assert!(store.requires_root());
    }

    #[tokio::test]
    async fn backup_and_restore_copy_keystore() {
        let tmp = tempfile::tempdir().unwrap();
        let keystore = tmp.path().join("cacerts");
        std::fs::write(&keystore, b"original").unwrap();
        let store = JavaCacertsStore::new(&target(&keystore)).unwrap();

        let snap = tmp.path().join("snap");
        store.backup(&snap).await.unwrap();
        std::fs::write(&keystore, b"modified").unwrap();
        store.restore(&snap).await.unwrap();
        assert_eq!(std::fs::read(&keystore).unwrap(), b"original");
    }

    #[test]
    fn import_alias_uses_fingerprint_prefix() {
        let a = ca("Alpha Root");
        assert_eq!(alias_for(&a.fingerprint), format!("tsu-{}", a.fingerprint.short()));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn storepass_is_passed_through_env_not_argv() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let keystore = tmp.path().join("cacerts");
        std::fs::write(&keystore, b"ks").unwrap();
        let seen = tmp.path().join("seen");
        let script = tmp.path().join("keytool");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nprintf '%s\\n' \"$*\" \"$TSU_KEYTOOL_STOREPASS\" > '{}'\n",
                seen.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut target = target(&keystore);
        target
            .options
            .insert("keytool".into(), script.display().to_string());
        target.options.insert("storepass".into(), "hunter2".into());
        let store = JavaCacertsStore::new(&target).unwrap();

        assert!(store.list_certificates().await.unwrap().is_empty());
        let seen = std::fs::read_to_string(&seen).unwrap();
        let mut lines = seen.lines();
        let argv = lines.next().unwrap();
        assert!(argv.contains("-storepass:env TSU_KEYTOOL_STOREPASS"));
        assert!(!argv.contains("hunter2"));
        assert_eq!(lines.next(), Some("hunter2"));
    }
}
