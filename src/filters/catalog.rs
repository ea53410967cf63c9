use std::sync::LazyLock;

use regex::Regex;

use super::field::TextField;
use super::pipeline::FilterPipeline;
use super::spec::{FilterSpec, SwitchTarget};

static REPOSITORY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z0-9._/-]*$").expect("repository name pattern"));

/// The filters offered on every artifact screen.
pub fn default_filters() -> Vec<FilterSpec> {
    vec![
        FilterSpec::input("CVE", TextField::Cve),
        FilterSpec::input("Description", TextField::Description),
        FilterSpec::input("Package", TextField::Package),
        FilterSpec::input("Repository", TextField::Repository).with_pattern(REPOSITORY_NAME.clone()),
        FilterSpec::switch("Fixable", SwitchTarget::Fixable),
        FilterSpec::severity_selection("Severity"),
    ]
}

pub fn default_pipeline() -> FilterPipeline {
    FilterPipeline::new(default_filters())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FilterKind, FilterValue};

    #[test]
    fn test_default_filters_validate() {
        for spec in default_filters() {
            assert!(spec.validate(), "{} should validate", spec.name());
            assert!(!spec.is_active());
        }
    }

    #[test]
    fn test_default_pipeline_order() {
        let pipeline = default_pipeline();
        let kinds: Vec<&str> = pipeline.filters().iter().map(|f| f.kind().label()).collect();
        assert_eq!(kinds, vec!["selection", "switch", "input", "input", "input", "input"]);
        assert!(matches!(
            pipeline.get("severity").map(|f| f.kind()),
            Some(FilterKind::Selection { options }) if options.len() == 6
        ));
    }

    #[test]
    fn test_repository_filter_rejects_spaces() {
        let mut pipeline = default_pipeline();
        assert!(pipeline
            .set_value("Repository", FilterValue::Text("my repo".into()))
            .is_err());
        assert!(pipeline
            .set_value("Repository", FilterValue::Text("Library/Nginx".into()))
            .is_ok());
    }
}
