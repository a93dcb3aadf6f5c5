//! File-name glob filters for directory sources.

use glob::Pattern;
use tsu_core::{Result, TsuError};

/// Matches file names against a set of globs.
///
/// An empty filter set matches every file.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    patterns: Vec<Pattern>,
}

impl FileFilter {
    /// Compile glob filters such as `*.crt`.
    ///
    /// # Errors
    ///
    /// Returns `TsuError::Config` for an invalid glob.
    pub fn new<S: AsRef<str>>(filters: &[S]) -> Result<Self> {
        let patterns = filters
            .iter()
            .map(|f| {
                Pattern::new(f.as_ref())
                    .map_err(|e| TsuError::Config(format!("invalid file filter {:?}: {e}", f.as_ref())))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// True if the file name matches at least one glob.
    #[must_use]
    pub fn matches(&self, file_name: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(file_name))
    }
}
