use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::HarborError;
use crate::models::{ArtifactCollection, ArtifactRecord, Severity};
use super::spec::{FilterSpec, FilterValue};

/// Order of the report rows, applied after filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Fetch order.
    #[default]
    None,
    /// Highest finding severity first.
    Severity,
    /// Newest push first.
    Date,
    /// Repository, then tag.
    Name,
}

impl SortOrder {
    pub const ALL: [SortOrder; 4] = [SortOrder::None, SortOrder::Severity, SortOrder::Date, SortOrder::Name];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::None => "none",
            SortOrder::Severity => "severity",
            SortOrder::Date => "date",
            SortOrder::Name => "name",
        }
    }

    fn sort(&self, records: &mut [ArtifactRecord]) {
        match self {
            SortOrder::None => {}
            SortOrder::Severity => {
                records.sort_by_key(|r| r.max_severity().map_or(u8::MAX, |s| s.rank()))
            }
            SortOrder::Date => records.sort_by_key(|r| Reverse(r.push_time)),
            SortOrder::Name => records.sort_by_key(|r| (r.repository.clone(), r.display_name())),
        }
    }
}

impl FromStr for SortOrder {
    type Err = HarborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "off" => Ok(SortOrder::None),
            "severity" | "sev" => Ok(SortOrder::Severity),
            "date" | "pushed" | "push_time" => Ok(SortOrder::Date),
            "name" | "tag" => Ok(SortOrder::Name),
            other => Err(HarborError::Validation(format!(
                "unknown sort order '{}' (expected none, severity, date or name)",
                other
            ))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`FilterPipeline::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterReport {
    pub artifacts: ArtifactCollection,
    pub count: usize,
    /// Names of the filters that participated, in the order they ran.
    pub applied: Vec<String>,
    pub sort: SortOrder,
}

impl FilterReport {
    /// Findings per severity across the report, highest severity first.
    pub fn severity_counts(&self) -> Vec<(Severity, usize)> {
        let mut counts: BTreeMap<u8, (Severity, usize)> = BTreeMap::new();
        for finding in self.artifacts.iter().flat_map(|r| r.findings.iter()) {
            counts
                .entry(finding.severity.rank())
                .or_insert((finding.severity, 0))
                .1 += 1;
        }
        counts.into_values().collect()
    }
}

/// An ordered set of filters. Selection filters run first, then switches,
/// then text inputs; order within a kind is declaration order.
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    filters: Vec<FilterSpec>,
    sort: SortOrder,
}

impl FilterPipeline {
    pub fn new(specs: Vec<FilterSpec>) -> Self {
        let mut filters: Vec<FilterSpec> = Vec::with_capacity(specs.len());
        for spec in specs {
            if filters.iter().any(|f| f.name().eq_ignore_ascii_case(spec.name())) {
                warn!(filter = %spec.name(), "Duplicate filter name, keeping the first");
                continue;
            }
            filters.push(spec);
        }
        // sort_by_key is stable
        filters.sort_by_key(|f| f.kind().stage());
        Self {
            filters,
            sort: SortOrder::None,
        }
    }

    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    pub fn get(&self, name: &str) -> Option<&FilterSpec> {
        self.filters.iter().find(|f| f.name().eq_ignore_ascii_case(name))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut FilterSpec, HarborError> {
        self.filters
            .iter_mut()
            .find(|f| f.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| HarborError::Validation(format!("no filter named '{}'", name)))
    }

    /// A rejected value leaves the filter as it was.
    pub fn set_value(&mut self, name: &str, value: FilterValue) -> Result<(), HarborError> {
        let spec = self.get_mut(name)?;
        spec.set_value(value)?;
        debug!(filter = %spec.name(), value = %spec.value(), "Filter updated");
        Ok(())
    }

    /// Reset one filter, or all of them, to the default value.
    pub fn clear(&mut self, name: Option<&str>) -> Result<(), HarborError> {
        match name {
            Some(name) => self.get_mut(name)?.reset(),
            None => self.filters.iter_mut().for_each(FilterSpec::reset),
        }
        Ok(())
    }

    pub fn active(&self) -> impl Iterator<Item = &FilterSpec> {
        self.filters.iter().filter(|f| f.is_active())
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        self.sort = sort;
    }

    /// Folds every active filter over `collection`. The input is left as is.
    pub fn run(&self, collection: &ArtifactCollection) -> FilterReport {
        let mut applied = Vec::new();
        let mut current = collection.clone();
        for spec in self.active() {
            current = spec.apply_current(&current);
            applied.push(spec.name().to_string());
        }

        let mut records = current.into_records();
        self.sort.sort(&mut records);
        let artifacts = ArtifactCollection::from_unique(records);

        debug!(
            input = collection.len(),
            output = artifacts.len(),
            applied = ?applied,
            "Filter pipeline run"
        );

        FilterReport {
            count: artifacts.len(),
            artifacts,
            applied,
            sort: self.sort,
        }
    }

    /// Runs the pipeline on the blocking pool so large collections do not
    /// stall the session.
    pub async fn run_offloaded(&self, collection: Arc<ArtifactCollection>) -> Result<FilterReport, HarborError> {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.run(&collection))
            .await
            .map_err(|e| HarborError::Internal(format!("filter worker failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{SwitchTarget, TextField};
    use crate::models::Finding;
    use chrono::{TimeZone, Utc};

    fn record(digest: &str, repo: &str, tag: &str, day: u32, findings: &[(&str, Severity, bool)]) -> ArtifactRecord {
        ArtifactRecord {
            digest: digest.to_string(),
            repository: repo.to_string(),
            tags: vec![tag.to_string()],
            push_time: Some(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
            findings: findings
                .iter()
                .map(|(cve, severity, fixable)| Finding {
                    cve_id: cve.to_string(),
                    severity: *severity,
                    package: "pkg".to_string(),
                    version: "1".to_string(),
                    fix_version: fixable.then(|| "2".to_string()),
                    description: String::new(),
                })
                .collect(),
        }
    }

    fn collection() -> ArtifactCollection {
        ArtifactCollection::new(vec![
            record("sha256:a", "library/nginx", "1.25", 3, &[("CVE-2023-1", Severity::High, true)]),
            record("sha256:b", "library/alpine", "3.19", 9, &[("CVE-2022-2", Severity::Low, false)]),
            record("sha256:c", "library/redis", "7", 1, &[("CVE-2023-3", Severity::Medium, false)]),
        ])
    }

    fn pipeline() -> FilterPipeline {
        FilterPipeline::new(vec![
            FilterSpec::input("CVE", TextField::Cve),
            FilterSpec::switch("Fixable", SwitchTarget::Fixable),
            FilterSpec::severity_selection("Severity"),
        ])
    }

    #[test]
    fn test_pipeline_orders_selection_switch_input() {
        let p = pipeline();
        let names: Vec<&str> = p.filters().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["Severity", "Fixable", "CVE"]);
    }

    #[test]
    fn test_pipeline_drops_duplicate_names() {
        let p = FilterPipeline::new(vec![
            FilterSpec::input("CVE", TextField::Cve),
            FilterSpec::input("cve", TextField::Package),
        ]);
        assert_eq!(p.filters().len(), 1);
    }

    #[test]
    fn test_run_with_nothing_active_is_identity() {
        let source = collection();
        let report = pipeline().run(&source);
        assert_eq!(report.artifacts, source);
        assert_eq!(report.count, 3);
        assert!(report.applied.is_empty());
    }

    #[test]
    fn test_run_selection_high_counts_one() {
        let mut p = pipeline();
        p.set_value("severity", FilterValue::selection(["High"])).unwrap();
        let report = p.run(&collection());
        assert_eq!(report.count, 1);
        assert_eq!(report.artifacts.records()[0].digest, "sha256:a");
        assert_eq!(report.applied, vec!["Severity".to_string()]);
    }

    #[test]
    fn test_run_composes_filters() {
        let mut p = pipeline();
        p.set_value("CVE", FilterValue::Text("2023".into())).unwrap();
        assert_eq!(p.run(&collection()).count, 2);
        p.set_value("Fixable", FilterValue::Switch(true)).unwrap();
        let report = p.run(&collection());
        assert_eq!(report.count, 1);
        assert_eq!(report.applied, vec!["Fixable".to_string(), "CVE".to_string()]);
    }

    #[test]
    fn test_run_is_deterministic_and_pure() {
        let source = collection();
        let mut p = pipeline();
        p.set_value("CVE", FilterValue::Text("cve-2023".into())).unwrap();
        p.set_sort(SortOrder::Date);
        let first = p.run(&source);
        let second = p.run(&source);
        assert_eq!(first, second);
        assert_eq!(source, collection());
    }

    #[test]
    fn test_invalid_value_does_not_activate_filter() {
        let mut p = pipeline();
        let err = p.set_value("Severity", FilterValue::selection(["Severe"])).unwrap_err();
        assert!(matches!(err, HarborError::Validation(_)));
        assert_eq!(p.active().count(), 0);
        assert!(p.set_value("Missing", FilterValue::Switch(true)).is_err());
    }

    #[test]
    fn test_clear_resets_filters() {
        let mut p = pipeline();
        p.set_value("CVE", FilterValue::Text("x".into())).unwrap();
        p.set_value("Fixable", FilterValue::Switch(true)).unwrap();
        p.clear(Some("cve")).unwrap();
        assert_eq!(p.active().count(), 1);
        p.clear(None).unwrap();
        assert_eq!(p.active().count(), 0);
    }

    #[test]
    fn test_sort_orders() {
        let source = collection();
        let mut p = pipeline();
        let digests = |p: &FilterPipeline| -> Vec<String> {
            p.run(&source).artifacts.iter().map(|r| r.digest.clone()).collect()
        };

        p.set_sort(SortOrder::Severity);
        assert_eq!(digests(&p), vec!["sha256:a", "sha256:c", "sha256:b"]);
        p.set_sort(SortOrder::Date);
        assert_eq!(digests(&p), vec!["sha256:b", "sha256:a", "sha256:c"]);
        p.set_sort(SortOrder::Name);
        assert_eq!(digests(&p), vec!["sha256:b", "sha256:a", "sha256:c"]);
    }

    #[test]
    fn test_sort_order_from_str() {
        assert_eq!("Severity".parse::<SortOrder>().unwrap(), SortOrder::Severity);
        assert_eq!("".parse::<SortOrder>().unwrap(), SortOrder::None);
        assert!("size".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_severity_counts() {
        let report = pipeline().run(&collection());
        assert_eq!(
            report.severity_counts(),
            vec![(Severity::High, 1), (Severity::Medium, 1), (Severity::Low, 1)]
        );
    }

    #[tokio::test]
    async fn test_run_offloaded_matches_run() {
        let mut p = pipeline();
        p.set_value("Severity", FilterValue::selection(["Low", "Medium"])).unwrap();
        let source = collection();
        let offloaded = p.run_offloaded(Arc::new(source.clone())).await.unwrap();
        assert_eq!(offloaded, p.run(&source));
    }
}
