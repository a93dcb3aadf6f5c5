use assert_cmd::Command;
use predicates::prelude::*;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use std::path::Path;

fn ca_pem(cn: &str) -> String {
    let mut params = CertificateParams::new(Vec::new()).unwrap();
    params.distinguished_name.push(DnType::CommonName, cn);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let key = KeyPair::generate().unwrap();
    params.self_signed(&key).unwrap().pem()
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    let bundle = dir.join("roots.pem");
    std::fs::write(&bundle, format!("{}{}", ca_pem("CLI Root One"), ca_pem("CLI Root Two"))).unwrap();

    let config = format!(
        r#"
certificate_sources:
  - name: bundle
    type: file
    source: "{bundle}"
    enabled: true
trust_stores:
  - name: pem-store
    type: application
    platform: ["linux", "darwin", "windows"]
    target: pem-directory
    enabled: true
    options:
      path: "{store}"
settings:
  backup_enabled: true
  backup_directory: "{backups}"
  validate_after: true
"#,
        bundle = bundle.display(),
        store = dir.join("store").display(),
        backups = dir.join("backups").display(),
    );
    let path = dir.join("config.yaml");
    std::fs::write(&path, config).unwrap();
    path
}

fn tsu() -> Command {
    let mut cmd = Command::cargo_bin("trust-store-updater").unwrap();
    cmd.env_remove("TSU_CONFIG")
        .env_remove("TSU_DRY_RUN")
        .env_remove("TSU_VERBOSE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn missing_config_writes_template_and_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trust-store-config.yaml");

    tsu()
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("a default was written"));

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("certificate_sources:"));
}

#[test]
fn dry_run_reports_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    tsu()
        .arg("--config")
        .arg(&config)
        .args(["--dry-run", "--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dry_run\": true"))
        .stdout(predicate::str::contains("CLI Root One"));

    assert!(!dir.path().join("store").exists());
    assert!(!dir.path().join("backups").exists());
}

#[test]
fn run_installs_certificates_then_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    tsu()
        .arg("--config")
        .arg(&config)
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 certificate(s) added, 0 failed"));

    let installed = std::fs::read_dir(dir.path().join("store")).unwrap().count();
    assert_eq!(installed, 2);
    assert!(dir.path().join("backups").is_dir());

    tsu()
        .arg("--config")
        .arg(&config)
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 certificate(s) added, 0 failed"));
}

#[test]
fn fatal_config_error_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.yaml");
    std::fs::write(&path, "settings:\n  backup_enabled: false\n").unwrap();

    tsu()
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no certificate sources configured"));
}
