//! External tool invocation shared by tool-backed stores.

use std::ffi::OsStr;
use std::io::Write as _;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

use tsu_core::{Certificate, Result, TsuError};

/// Is `program` on `PATH`?
pub fn tool_available(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Run a program to completion and return its stdout.
///
/// A non-zero exit status is a `TsuError::Command` carrying the trimmed
/// stderr.
pub async fn run<I, S>(program: &str, args: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_with_env(program, args, std::iter::empty::<(&str, &str)>()).await
}

/// Like [`run`], with extra environment variables set on the child only.
///
/// Values are never logged, so secrets belong here rather than in `args`.
pub async fn run_with_env<I, S, E, K, V>(program: &str, args: I, envs: E) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
    E: IntoIterator<Item = (K, V)>,
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
    debug!(program, ?args, "running command");

    let output = Command::new(program)
        .args(&args)
        .envs(envs)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| TsuError::Command {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(TsuError::Command {
            program: program.to_string(),
            reason: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(output.stdout)
}

/// Run a command line with POSIX shell quoting, e.g.
/// `update-ca-trust extract` or `sh -c 'c_rehash "/etc/ssl/my certs"'`.
pub async fn run_line(line: &str) -> Result<Vec<u8>> {
    let parts = shell_words::split(line)
        .map_err(|e| TsuError::Config(format!("invalid command line `{line}`: {e}")))?;
    let Some((program, args)) = parts.split_first() else {
        return Err(TsuError::Config("empty command line".into()));
    };
    run(program, args).await
}

/// A certificate written to a fresh temp file for a tool to import.
///
/// The file is created exclusively with a random name and removed when
/// this value is dropped, so keep it alive until the tool has exited.
pub struct TempCertFile {
    file: NamedTempFile,
}

impl TempCertFile {
    /// PEM encoding, `.pem` extension.
    pub async fn pem(cert: &Certificate) -> Result<Self> {
        Self::write(".pem", cert.to_pem().into_bytes()).await
    }

    /// Raw DER encoding, `.cer` extension.
    pub async fn der(cert: &Certificate) -> Result<Self> {
        Self::write(".cer", cert.der.clone()).await
    }

    async fn write(suffix: &'static str, contents: Vec<u8>) -> Result<Self> {
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut file = tempfile::Builder::new()
                .prefix("tsu-")
                .suffix(suffix)
                .tempfile()?;
            file.write_all(&contents)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(|e| TsuError::Store(format!("temp file task failed: {e}")))?
        .map_err(|e| TsuError::io(std::env::temp_dir().display().to_string(), e))?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ca;

    #[tokio::test]
    #[cfg(unix)]
    async fn captures_stdout() {
        let out = run("echo", ["hello"]).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out).trim(), "hello");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn non_zero_exit_is_command_error() {
        let err = run_line("false").await.unwrap_err();
        assert!(matches!(err, TsuError::Command { ref program, .. } if program == "false"));
    }

    #[tokio::test]
    async fn missing_program_is_command_error() {
        let err = run("tsu-definitely-not-installed", ["x"]).await.unwrap_err();
        assert!(matches!(err, TsuError::Command { .. }));
        assert!(!tool_available("tsu-definitely-not-installed"));
    }

    #[tokio::test]
    async fn empty_line_is_rejected() {
        assert!(matches!(run_line("   ").await, Err(TsuError::Config(_))));
    }

    #[tokio::test]
    async fn unbalanced_quotes_are_rejected() {
        assert!(matches!(
            run_line("c_rehash 'unterminated").await,
            Err(TsuError::Config(_))
        ));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn quoted_arguments_stay_whole() {
        let out = run_line(r#"printf '%s|' "two words" plain"#).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out), "two words|plain|");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn env_reaches_child_only() {
        let script = "printf %s \"$TSU_TEST_SECRET\"";
        let out = run_with_env("sh", ["-c", script], [("TSU_TEST_SECRET", "s3cret")])
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out), "s3cret");
        assert!(std::env::var_os("TSU_TEST_SECRET").is_none());
    }

    #[tokio::test]
    async fn temp_cert_file_holds_certificate_and_is_removed_on_drop() {
        let cert = ca("Temp Root");
        let file = TempCertFile::pem(&cert).await.unwrap();
        let path = file.path().to_path_buf();
        let parsed = tsu_core::parse_certificates(&std::fs::read(&path).unwrap(), "t").unwrap();
        assert_eq!(parsed[0].fingerprint, cert.fingerprint);

        drop(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn temp_cert_file_never_follows_planted_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let victim = dir.path().join("victim.conf");
        std::fs::write(&victim, "precious").unwrap();

        let cert = ca("Symlink Root");
        // Names a predictable scheme would have picked.
        let mut planted = Vec::new();
        for seq in 0..64 {
            let link = std::env::temp_dir().join(format!(
                "tsu-{}-{seq}-{}.pem",
                std::process::id(),
                cert.fingerprint.short()
            ));
            if std::os::unix::fs::symlink(&victim, &link).is_ok() {
                planted.push(link);
            }
        }

        let files = [
            TempCertFile::pem(&cert).await.unwrap(),
            TempCertFile::pem(&cert).await.unwrap(),
        ];
        assert_ne!(files[0].path(), files[1].path());
        for file in &files {
            assert!(!std::fs::symlink_metadata(file.path()).unwrap().file_type().is_symlink());
        }
        assert_eq!(std::fs::read_to_string(&victim).unwrap(), "precious");

        for link in planted {
            let _ = std::fs::remove_file(link);
        }
    }
}
