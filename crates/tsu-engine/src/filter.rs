//! Certificate subject filters.

use tracing::debug;

use tsu_core::{Certificate, SubjectFilterPolicy};

/// A source's `filters` applied to certificate subjects.
///
/// Matching is a case-insensitive substring test on the subject. Filters
/// that look like file-name globs (`*`, `?`, `[`) only select files in
/// directory sources and are ignored here.
#[derive(Debug, Clone)]
pub struct SubjectFilter {
    policy: SubjectFilterPolicy,
    terms: Vec<String>,
}

impl SubjectFilter {
    pub fn new<S: AsRef<str>>(policy: SubjectFilterPolicy, filters: &[S]) -> Self {
        let terms = filters
            .iter()
            .map(AsRef::as_ref)
            .filter(|f| !f.is_empty() && !f.contains(['*', '?', '[']))
            .map(str::to_lowercase)
            .collect();
        Self { policy, terms }
    }

    /// Does any term occur in the subject?
    pub fn matches(&self, cert: &Certificate) -> bool {
        let subject = cert.subject.to_lowercase();
        self.terms.iter().any(|t| subject.contains(t.as_str()))
    }

    /// Keep this certificate?
    ///
    /// `Allow` keeps everything. `Deny` keeps only matches, unless there
    /// are no subject terms at all.
    pub fn accepts(&self, cert: &Certificate) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        let matched = self.matches(cert);
        debug!(subject = %cert.subject, matched, policy = ?self.policy, "subject filter");
        match self.policy {
            SubjectFilterPolicy::Allow => true,
            SubjectFilterPolicy::Deny => matched,
        }
    }
}
