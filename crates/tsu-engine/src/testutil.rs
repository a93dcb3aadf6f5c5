//! In-memory collaborators for orchestrator tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tsu_core::{
    Certificate, CertificateSource, CertificateStore, Fingerprint, Platform, Result,
    SourceFetcher, StoreFactory, StoreKind, TrustStoreTarget, TsuError,
};

/// Self-signed CA certificate, valid now.
pub fn ca(cn: &str) -> Certificate {
    let mut params = CertificateParams::new(Vec::new()).unwrap();
    params.distinguished_name.push(DnType::CommonName, cn);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();
    Certificate::from_der(cert.der(), "test").unwrap()
}

/// CA certificate whose validity ended yesterday.
pub fn expired(cn: &str) -> Certificate {
    let mut cert = ca(cn);
    cert.not_before = Utc::now() - Duration::days(365);
    cert.not_after = Utc::now() - Duration::days(1);
    cert
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Add(Fingerprint),
    Remove(Fingerprint),
    Backup(PathBuf),
    Restore(PathBuf),
    Validate,
}

#[derive(Default)]
struct State {
    certs: Vec<Certificate>,
    calls: Vec<Call>,
    fail_add: HashSet<Fingerprint>,
    fail_list: bool,
    fail_backup: bool,
    fail_validate: bool,
}

/// Store that records every call. Clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    name: String,
    supported: bool,
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            supported: true,
            state: Arc::default(),
        }
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn with_certs(self, certs: Vec<Certificate>) -> Self {
        self.state.lock().unwrap().certs = certs;
        self
    }

    pub fn failing_add(self, fingerprint: &Fingerprint) -> Self {
        self.state.lock().unwrap().fail_add.insert(fingerprint.clone());
        self
    }

    pub fn failing_list(self) -> Self {
        self.state.lock().unwrap().fail_list = true;
        self
    }

    pub fn failing_backup(self) -> Self {
        self.state.lock().unwrap().fail_backup = true;
        self
    }

    pub fn failing_validate(self) -> Self {
        self.state.lock().unwrap().fail_validate = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn certs(&self) -> Vec<Certificate> {
        self.state.lock().unwrap().certs.clone()
    }

    /// Fingerprints of successful adds, in call order.
    pub fn adds(&self) -> Vec<Fingerprint> {
        let state = self.state.lock().unwrap();
        state
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Add(fp) if !state.fail_add.contains(fp) => Some(fp.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every add attempt, failed or not.
    pub fn attempted_adds(&self) -> Vec<Fingerprint> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Add(fp) => Some(fp),
                _ => None,
            })
            .collect()
    }

    /// Calls that would change a real store.
    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::Add(_) | Call::Remove(_) | Call::Backup(_) | Call::Restore(_)
                )
            })
            .count()
    }

    fn record(&self, call: Call) -> std::sync::MutexGuard<'_, State> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state
    }
}

#[async_trait]
impl CertificateStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn requires_root(&self) -> bool {
        false
    }

    async fn list_certificates(&self) -> Result<Vec<Certificate>> {
        let state = self.record(Call::List);
        if state.fail_list {
            return Err(TsuError::Store("listing failed".into()));
        }
        Ok(state.certs.clone())
    }

    async fn add_certificate(&self, cert: &Certificate) -> Result<()> {
        let mut state = self.record(Call::Add(cert.fingerprint.clone()));
        if state.fail_add.contains(&cert.fingerprint) {
            return Err(TsuError::Store(format!("rejected {}", cert.subject)));
        }
        state.certs.push(cert.clone());
        Ok(())
    }

    async fn remove_certificate(&self, cert: &Certificate) -> Result<()> {
        let mut state = self.record(Call::Remove(cert.fingerprint.clone()));
        state.certs.retain(|c| c.fingerprint != cert.fingerprint);
        Ok(())
    }

    async fn backup(&self, path: &Path) -> Result<()> {
        let state = self.record(Call::Backup(path.to_path_buf()));
        if state.fail_backup {
            return Err(TsuError::Store("disk full".into()));
        }
        Ok(())
    }

    async fn restore(&self, path: &Path) -> Result<()> {
        self.record(Call::Restore(path.to_path_buf()));
        Ok(())
    }

    async fn validate(&self) -> Result<()> {
        let state = self.record(Call::Validate);
        if state.fail_validate {
            return Err(TsuError::Store("store is corrupt".into()));
        }
        Ok(())
    }
}

/// Hands out [`MemoryStore`]s by target name for the `memory` target id.
#[derive(Default)]
pub struct TestFactory {
    stores: HashMap<String, MemoryStore>,
}

impl TestFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, store: MemoryStore) -> Self {
        self.stores.insert(store.name.clone(), store);
        self
    }
}

impl StoreFactory for TestFactory {
    fn create_store(
        &self,
        target: &TrustStoreTarget,
        platform: Platform,
    ) -> Result<Box<dyn CertificateStore>> {
        if target.target != "memory" {
            return Err(TsuError::UnsupportedTarget {
                kind: target.kind.to_string(),
                target: target.target.clone(),
                platform: platform.to_string(),
            });
        }
        let store = self.stores.get(&target.name).ok_or_else(|| TsuError::StoreInit {
            store: target.name.clone(),
            reason: "no memory store registered".into(),
        })?;
        Ok(Box::new(store.clone()))
    }

    fn supported_targets(&self, _platform: Platform, _kind: StoreKind) -> Vec<String> {
        vec!["memory".into()]
    }
}

/// Returns canned certificates per source name; unknown names fail.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: HashMap<String, Option<Vec<Certificate>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: &str, certs: Vec<Certificate>) -> Self {
        self.scripts.insert(source.to_string(), Some(certs));
        self
    }

    pub fn failing(mut self, source: &str) -> Self {
        self.scripts.insert(source.to_string(), None);
        self
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch(&self, source: &CertificateSource) -> Result<Vec<Certificate>> {
        match self.scripts.get(&source.name) {
            Some(Some(certs)) => Ok(certs.clone()),
            _ => Err(TsuError::SourceFetch {
                name: source.name.clone(),
                reason: "connection refused".into(),
            }),
        }
    }
}
