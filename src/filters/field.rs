use std::fmt;

use crate::models::ArtifactRecord;

/// The record field an input filter searches. Bound when the filter is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Cve,
    Package,
    Description,
    Repository,
}

impl TextField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextField::Cve => "cve",
            TextField::Package => "package",
            TextField::Description => "description",
            TextField::Repository => "repository",
        }
    }

    /// `needle` must already be lowercased.
    pub fn matches(&self, record: &ArtifactRecord, needle: &str) -> bool {
        let contains = |haystack: &str| haystack.to_lowercase().contains(needle);
        match self {
            TextField::Repository => contains(&record.repository),
            TextField::Cve => record.findings.iter().any(|f| contains(&f.cve_id)),
            TextField::Package => record.findings.iter().any(|f| contains(&f.package)),
            TextField::Description => record.findings.iter().any(|f| contains(&f.description)),
        }
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
