use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;
use tracing::warn;

use crate::errors::HarborError;
use crate::models::{ArtifactCollection, ArtifactRecord, Severity};
use super::field::TextField;

/// The value a filter is set to. Blank values leave the filter inactive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Switch(bool),
    Selection(BTreeSet<String>),
}

impl FilterValue {
    pub fn is_blank(&self) -> bool {
        match self {
            FilterValue::Text(text) => text.trim().is_empty(),
            FilterValue::Switch(on) => !on,
            FilterValue::Selection(selected) => selected.is_empty(),
        }
    }

    pub fn selection<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::Selection(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(text) => write!(f, "{:?}", text),
            FilterValue::Switch(on) => f.write_str(if *on { "on" } else { "off" }),
            FilterValue::Selection(selected) => {
                let items: Vec<&str> = selected.iter().map(String::as_str).collect();
                write!(f, "{{{}}}", items.join(", "))
            }
        }
    }
}

/// The predicate a switch filter restricts to when on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchTarget {
    /// At least one finding has a fix version.
    Fixable,
    /// At least one finding at all.
    Vulnerable,
}

impl SwitchTarget {
    fn matches(&self, record: &ArtifactRecord) -> bool {
        match self {
            SwitchTarget::Fixable => record.findings.iter().any(|f| f.is_fixable()),
            SwitchTarget::Vulnerable => !record.findings.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FilterKind {
    /// Case-insensitive substring search on one field.
    Input {
        field: TextField,
        pattern: Option<Regex>,
    },
    Switch {
        target: SwitchTarget,
        options: Vec<bool>,
    },
    /// Keeps findings whose severity is selected.
    Selection { options: Vec<String> },
}

impl FilterKind {
    pub fn label(&self) -> &'static str {
        match self {
            FilterKind::Input { .. } => "input",
            FilterKind::Switch { .. } => "switch",
            FilterKind::Selection { .. } => "selection",
        }
    }

    /// Cheaper, set-shrinking kinds run first.
    pub(crate) fn stage(&self) -> u8 {
        match self {
            FilterKind::Selection { .. } => 0,
            FilterKind::Switch { .. } => 1,
            FilterKind::Input { .. } => 2,
        }
    }

    fn blank_value(&self) -> FilterValue {
        match self {
            FilterKind::Input { .. } => FilterValue::Text(String::new()),
            FilterKind::Switch { .. } => FilterValue::Switch(false),
            FilterKind::Selection { .. } => FilterValue::Selection(BTreeSet::new()),
        }
    }

    fn accepts_shape(&self, value: &FilterValue) -> bool {
        matches!(
            (self, value),
            (FilterKind::Input { .. }, FilterValue::Text(_))
                | (FilterKind::Switch { .. }, FilterValue::Switch(_))
                | (FilterKind::Selection { .. }, FilterValue::Selection(_))
        )
    }
}

/// A named, declarative filter over an [`ArtifactCollection`].
#[derive(Debug, Clone)]
pub struct FilterSpec {
    name: String,
    kind: FilterKind,
    default: FilterValue,
    value: FilterValue,
}

impl FilterSpec {
    pub fn input(name: &str, field: TextField) -> Self {
        Self::with_kind(name, FilterKind::Input { field, pattern: None })
    }

    pub fn switch(name: &str, target: SwitchTarget) -> Self {
        Self::with_kind(
            name,
            FilterKind::Switch {
                target,
                options: vec![false, true],
            },
        )
    }

    pub fn severity_selection(name: &str) -> Self {
        let options = Severity::ALL.iter().map(|s| s.as_str().to_string()).collect();
        Self::with_kind(name, FilterKind::Selection { options })
    }

    fn with_kind(name: &str, kind: FilterKind) -> Self {
        let blank = kind.blank_value();
        Self {
            name: name.to_string(),
            kind,
            default: blank.clone(),
            value: blank,
        }
    }

    /// Constrain an input filter's text with a regex (matched from the start).
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        if let FilterKind::Input { pattern: slot, .. } = &mut self.kind {
            *slot = Some(pattern);
        }
        self
    }

    /// Replace the switch option set.
    pub fn with_options(mut self, new_options: Vec<bool>) -> Self {
        if let FilterKind::Switch { options, .. } = &mut self.kind {
            *options = new_options;
        }
        self
    }

    /// Set the default, which also becomes the current value.
    pub fn with_default(mut self, default: FilterValue) -> Self {
        if self.kind.accepts_shape(&default) {
            self.value = default.clone();
            self.default = default;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    pub fn default_value(&self) -> &FilterValue {
        &self.default
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    pub fn is_active(&self) -> bool {
        !self.value.is_blank()
    }

    /// Advisory check. Input filters check their default against the
    /// pattern; switch and selection filters check the current value against
    /// their options.
    pub fn validate(&self) -> bool {
        match (&self.kind, &self.value) {
            (FilterKind::Input { pattern, .. }, _) => match (pattern, &self.default) {
                (None, _) => true,
                (Some(re), FilterValue::Text(default)) => matches_from_start(re, default),
                (Some(_), _) => false,
            },
            (FilterKind::Switch { options, .. }, FilterValue::Switch(on)) => options.contains(on),
            (FilterKind::Selection { options }, FilterValue::Selection(selected)) => {
                selected.iter().all(|s| contains_ignore_case(options, s))
            }
            _ => false,
        }
    }

    /// Sets the current value if it has the right shape and the filter still
    /// validates with it. On error the previous value is kept.
    pub fn set_value(&mut self, value: FilterValue) -> Result<(), HarborError> {
        if !self.kind.accepts_shape(&value) {
            return Err(HarborError::Validation(format!(
                "filter '{}' is a {} filter and cannot take {}",
                self.name,
                self.kind.label(),
                value
            )));
        }
        if let (FilterKind::Input { pattern: Some(re), .. }, FilterValue::Text(text)) = (&self.kind, &value) {
            if !text.trim().is_empty() && !matches_from_start(re, text.trim()) {
                return Err(HarborError::Validation(format!(
                    "'{}' does not match the pattern for filter '{}'",
                    text, self.name
                )));
            }
        }

        let previous = std::mem::replace(&mut self.value, value);
        if !self.validate() {
            let rejected = std::mem::replace(&mut self.value, previous);
            return Err(HarborError::Validation(format!(
                "{} is not a valid value for filter '{}'",
                rejected, self.name
            )));
        }
        Ok(())
    }

    /// Reads user input as a value of this filter's shape. Switches take
    /// on/off, selections take a comma or space separated list.
    pub fn parse_value(&self, raw: &str) -> Result<FilterValue, HarborError> {
        let raw = raw.trim();
        match &self.kind {
            FilterKind::Input { .. } => Ok(FilterValue::Text(raw.to_string())),
            FilterKind::Switch { .. } => match raw.to_ascii_lowercase().as_str() {
                "on" | "true" | "yes" | "1" => Ok(FilterValue::Switch(true)),
                "off" | "false" | "no" | "0" | "" => Ok(FilterValue::Switch(false)),
                other => Err(HarborError::Validation(format!(
                    "'{}' is not on or off for filter '{}'",
                    other, self.name
                ))),
            },
            FilterKind::Selection { options } => Ok(FilterValue::Selection(
                raw.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|part| !part.is_empty())
                    .map(|part| {
                        options
                            .iter()
                            .find(|o| o.eq_ignore_ascii_case(part))
                            .cloned()
                            .unwrap_or_else(|| part.to_string())
                    })
                    .collect(),
            )),
        }
    }

    pub fn reset(&mut self) {
        self.value = self.default.clone();
    }

    /// Applies the current value.
    pub fn apply_current(&self, collection: &ArtifactCollection) -> ArtifactCollection {
        self.apply(collection, &self.value)
    }

    /// Returns a new collection; the input is never modified. A blank value
    /// or a value of the wrong shape is the identity.
    pub fn apply(&self, collection: &ArtifactCollection, value: &FilterValue) -> ArtifactCollection {
        if value.is_blank() {
            return collection.clone();
        }
        match (&self.kind, value) {
            (FilterKind::Input { field, .. }, FilterValue::Text(text)) => {
                let needle = text.trim().to_lowercase();
                keep(collection, |record| field.matches(record, &needle))
            }
            (FilterKind::Switch { target, .. }, FilterValue::Switch(_on)) => {
                keep(collection, |record| target.matches(record))
            }
            (FilterKind::Selection { options }, FilterValue::Selection(selected)) => {
                // A selected value outside the options selects nothing.
                let wanted: Vec<Severity> = selected
                    .iter()
                    .filter(|s| contains_ignore_case(options, s))
                    .filter_map(|s| s.parse().ok())
                    .collect();
                narrow_findings(collection, &wanted)
            }
            (kind, value) => {
                warn!(
                    filter = %self.name,
                    kind = kind.label(),
                    value = %value,
                    "Ignoring filter value of the wrong shape"
                );
                collection.clone()
            }
        }
    }
}

fn keep<P>(collection: &ArtifactCollection, predicate: P) -> ArtifactCollection
where
    P: Fn(&ArtifactRecord) -> bool,
{
    ArtifactCollection::from_unique(
        collection
            .iter()
            .filter(|record| predicate(record))
            .cloned()
            .collect(),
    )
}

fn narrow_findings(collection: &ArtifactCollection, wanted: &[Severity]) -> ArtifactCollection {
    let records = collection
        .iter()
        .filter_map(|record| {
            let findings: Vec<_> = record
                .findings
                .iter()
                .filter(|f| wanted.contains(&f.severity))
                .cloned()
                .collect();
            if findings.is_empty() {
                None
            } else {
                Some(ArtifactRecord {
                    findings,
                    ..record.clone()
                })
            }
        })
        .collect();
    ArtifactCollection::from_unique(records)
}

fn matches_from_start(re: &Regex, text: &str) -> bool {
    re.find(text).is_some_and(|m| m.start() == 0)
}

fn contains_ignore_case(options: &[String], value: &str) -> bool {
    options.iter().any(|o| o.eq_ignore_ascii_case(value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Finding;

    fn finding(cve: &str, severity: Severity, package: &str, fix: Option<&str>) -> Finding {
        Finding {
            cve_id: cve.to_string(),
            severity,
            package: package.to_string(),
            version: "1.0".to_string(),
            fix_version: fix.map(str::to_string),
            description: format!("{} in {}", cve, package),
        }
    }

    fn record(digest: &str, repository: &str, findings: Vec<Finding>) -> ArtifactRecord {
        ArtifactRecord {
            digest: digest.to_string(),
            repository: repository.to_string(),
            tags: vec!["latest".to_string()],
            push_time: None,
            findings,
        }
    }

    fn sample() -> ArtifactCollection {
        ArtifactCollection::new(vec![
            record(
                "sha256:1",
                "library/nginx",
                vec![finding("CVE-2023-1111", Severity::High, "openssl", Some("3.0.9"))],
            ),
            record(
                "sha256:2",
                "library/redis",
                vec![finding("CVE-2022-9999", Severity::Low, "zlib", None)],
            ),
            record(
                "sha256:3",
                "team/api",
                vec![
                    finding("CVE-2021-0001", Severity::Medium, "glibc", None),
                    finding("CVE-2021-0002", Severity::High, "curl", None),
                ],
            ),
        ])
    }

    #[test]
    fn test_blank_value_is_identity() {
        let collection = sample();
        for spec in [
            FilterSpec::input("CVE", TextField::Cve),
            FilterSpec::switch("Fixable", SwitchTarget::Fixable),
            FilterSpec::severity_selection("Severity"),
        ] {
            assert_eq!(spec.apply_current(&collection), collection);
            assert_eq!(spec.apply(&collection, spec.default_value()), collection);
        }
        let cve = FilterSpec::input("CVE", TextField::Cve);
        assert_eq!(cve.apply(&collection, &FilterValue::Text("   ".into())), collection);
    }

    #[test]
    fn test_input_filter_matches_substring_case_insensitively() {
        let collection = sample();
        let spec = FilterSpec::input("CVE", TextField::Cve);
        let result = spec.apply(&collection, &FilterValue::Text("cve-2023".into()));
        assert_eq!(result.len(), 1);
        assert_eq!(result.records()[0].digest, "sha256:1");

        let repo = FilterSpec::input("Repository", TextField::Repository);
        let result = repo.apply(&collection, &FilterValue::Text("LIBRARY/".into()));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_input_filter_keeps_all_findings_of_matching_record() {
        let spec = FilterSpec::input("Package", TextField::Package);
        let result = spec.apply(&sample(), &FilterValue::Text("curl".into()));
        assert_eq!(result.len(), 1);
        assert_eq!(result.records()[0].findings.len(), 2);
    }

    #[test]
    fn test_switch_on_restricts_off_is_identity() {
        let collection = sample();
        let spec = FilterSpec::switch("Fixable", SwitchTarget::Fixable);
        assert_eq!(spec.apply(&collection, &FilterValue::Switch(true)).len(), 1);
        assert_eq!(spec.apply(&collection, &FilterValue::Switch(false)), collection);
    }

    #[test]
    fn test_selection_narrows_findings_and_drops_empty_records() {
        let collection = sample();
        let spec = FilterSpec::severity_selection("Severity");
        let result = spec.apply(&collection, &FilterValue::selection(["high"]));
        let digests: Vec<&str> = result.iter().map(|r| r.digest.as_str()).collect();
        assert_eq!(digests, vec!["sha256:1", "sha256:3"]);
        assert_eq!(result.get("sha256:3").unwrap().findings.len(), 1);
        assert_eq!(result.get("sha256:3").unwrap().findings[0].package, "curl");
    }

    #[test]
    fn test_selection_outside_options_selects_nothing() {
        let spec = FilterSpec::severity_selection("Severity");
        let result = spec.apply(&sample(), &FilterValue::selection(["Severe"]));
        assert!(result.is_empty());
        let result = spec.apply(&sample(), &FilterValue::selection(["Severe", "Low"]));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_apply_does_not_mutate_input() {
        let collection = sample();
        let before = collection.clone();
        let spec = FilterSpec::severity_selection("Severity");
        let _ = spec.apply(&collection, &FilterValue::selection(["Low"]));
        assert_eq!(collection, before);
    }

    #[test]
    fn test_wrong_shape_is_identity() {
        let collection = sample();
        let spec = FilterSpec::input("CVE", TextField::Cve);
        assert_eq!(spec.apply(&collection, &FilterValue::Switch(true)), collection);
    }

    #[test]
    fn test_validate_input_checks_default_against_pattern() {
        let spec = FilterSpec::input("Repository", TextField::Repository);
        assert!(spec.validate());
        let spec = spec.with_pattern(Regex::new(r"^[a-z]+").unwrap());
        // Empty default does not match a pattern requiring one letter.
        assert!(!spec.validate());
        let spec = spec.with_default(FilterValue::Text("library".into()));
        assert!(spec.validate());
    }

    #[test]
    fn test_validate_switch_against_options() {
        let spec = FilterSpec::switch("Fixable", SwitchTarget::Fixable);
        assert!(spec.validate());
        let mut only_on = spec.with_options(vec![true]);
        assert!(!only_on.validate());
        assert!(only_on.set_value(FilterValue::Switch(true)).is_ok());
        assert!(only_on.validate());
    }

    #[test]
    fn test_set_value_rejects_invalid_and_keeps_previous() {
        let mut spec = FilterSpec::severity_selection("Severity");
        spec.set_value(FilterValue::selection(["High"])).unwrap();
        let err = spec.set_value(FilterValue::selection(["High", "Severe"])).unwrap_err();
        assert!(matches!(err, HarborError::Validation(_)));
        assert_eq!(spec.value(), &FilterValue::selection(["High"]));

        let err = spec.set_value(FilterValue::Text("High".into())).unwrap_err();
        assert!(matches!(err, HarborError::Validation(_)));
    }

    #[test]
    fn test_parse_value_per_kind() {
        let fixable = FilterSpec::switch("Fixable", SwitchTarget::Fixable);
        assert_eq!(fixable.parse_value("ON").unwrap(), FilterValue::Switch(true));
        assert!(fixable.parse_value("maybe").is_err());

        let severity = FilterSpec::severity_selection("Severity");
        assert_eq!(
            severity.parse_value("high, critical").unwrap(),
            FilterValue::selection(["Critical", "High"])
        );

        let cve = FilterSpec::input("CVE", TextField::Cve);
        assert_eq!(cve.parse_value(" CVE-2023 ").unwrap(), FilterValue::Text("CVE-2023".into()));
    }

    #[test]
    fn test_set_value_checks_input_pattern() {
        let mut spec = FilterSpec::input("Repository", TextField::Repository)
            .with_pattern(Regex::new(r"(?i)^[a-z0-9._/-]*$").unwrap());
        assert!(spec.set_value(FilterValue::Text("library/nginx".into())).is_ok());
        assert!(spec.set_value(FilterValue::Text("bad name!".into())).is_err());
        assert_eq!(spec.value(), &FilterValue::Text("library/nginx".into()));
        spec.reset();
        assert!(!spec.is_active());
    }
}
