use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::finding::{Finding, Severity};

/// An artifact fetched from the registry together with its scan findings.
/// Records are never edited in place; a refetch replaces them wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub digest: String,
    /// Full repository path, e.g. "library/nginx".
    pub repository: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub push_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl ArtifactRecord {
    /// First tag, falling back to the short digest.
    pub fn display_name(&self) -> String {
        self.tags
            .first()
            .cloned()
            .unwrap_or_else(|| self.short_digest().to_string())
    }

    pub fn short_digest(&self) -> &str {
        let hex = self.digest.split_once(':').map_or(self.digest.as_str(), |(_, h)| h);
        hex.get(..12).unwrap_or(hex)
    }

    /// "library/nginx@sha256:abcdef123456"
    pub fn name_with_digest(&self) -> String {
        let algo = self.digest.split_once(':').map_or("", |(a, _)| a);
        if algo.is_empty() {
            format!("{}@{}", self.repository, self.short_digest())
        } else {
            format!("{}@{}:{}", self.repository, algo, self.short_digest())
        }
    }

    /// Highest severity among the findings, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).min_by_key(|s| s.rank())
    }
}

/// Artifacts in fetch order. Digests are unique within a collection.
/// Serialized as a plain list; deserializing drops repeated digests like
/// [`ArtifactCollection::new`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ArtifactRecord>", into = "Vec<ArtifactRecord>")]
pub struct ArtifactCollection {
    records: Vec<ArtifactRecord>,
}

impl ArtifactCollection {
    /// Builds a collection, keeping the first record seen for each digest.
    pub fn new(records: Vec<ArtifactRecord>) -> Self {
        let mut collection = Self { records: Vec::with_capacity(records.len()) };
        for record in records {
            let digest = record.digest.clone();
            if !collection.push(record) {
                warn!(digest = %digest, "Dropping duplicate artifact digest");
            }
        }
        collection
    }

    /// Appends a record unless its digest is already present.
    pub fn push(&mut self, record: ArtifactRecord) -> bool {
        if self.contains(&record.digest) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.records.iter().any(|r| r.digest == digest)
    }

    pub fn get(&self, digest: &str) -> Option<&ArtifactRecord> {
        self.records.iter().find(|r| r.digest == digest)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ArtifactRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[ArtifactRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ArtifactRecord> {
        self.records
    }

    pub fn finding_count(&self) -> usize {
        self.records.iter().map(|r| r.findings.len()).sum()
    }

    // Only used by filters, whose output is always a subset of a valid input.
    pub(crate) fn from_unique(records: Vec<ArtifactRecord>) -> Self {
        Self { records }
    }
}

impl<'a> IntoIterator for &'a ArtifactCollection {
    type Item = &'a ArtifactRecord;
    type IntoIter = std::slice::Iter<'a, ArtifactRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl From<Vec<ArtifactRecord>> for ArtifactCollection {
    fn from(records: Vec<ArtifactRecord>) -> Self {
        Self::new(records)
    }
}

impl From<ArtifactCollection> for Vec<ArtifactRecord> {
    fn from(collection: ArtifactCollection) -> Self {
        collection.records
    }
}

impl FromIterator<ArtifactRecord> for ArtifactCollection {
    fn from_iter<I: IntoIterator<Item = ArtifactRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
