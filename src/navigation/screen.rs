use std::fmt;
use std::sync::Arc;

use crate::cache::CacheKey;
use crate::filters::{default_pipeline, FilterPipeline, FilterReport};
use crate::models::{ArtifactCollection, Project, Repository};
use super::options::{OptionList, ScreenOption};

/// Stable identity of a screen, e.g. `projects` or `repository:library/nginx`.
/// The parameter after the prefix is canonicalized like a cache key argument,
/// so `project: Library/` and `project:library` name the same screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScreenId(String);

impl ScreenId {
    pub const LOGIN: &'static str = "login";
    pub const PROJECTS: &'static str = "projects";
    pub const PROJECT_PREFIX: &'static str = "project:";
    pub const REPOSITORY_PREFIX: &'static str = "repository:";

    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let canonical = match id.split_once(':') {
            Some((prefix, param)) => format!(
                "{}:{}",
                prefix.trim().to_lowercase(),
                CacheKey::canonical_arg(param)
            ),
            None => id.trim().to_lowercase(),
        };
        Self(canonical)
    }

    pub fn login() -> Self {
        Self::new(Self::LOGIN)
    }

    pub fn projects() -> Self {
        Self::new(Self::PROJECTS)
    }

    pub fn project(name: &str) -> Self {
        Self::new(format!("{}{}", Self::PROJECT_PREFIX, name))
    }

    pub fn repository(full_name: &str) -> Self {
        Self::new(format!("{}{}", Self::REPOSITORY_PREFIX, full_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenKind {
    Login,
    ProjectList,
    RepositoryList { project: String },
    ArtifactList { repository: String },
}

impl ScreenKind {
    /// The facade call that feeds this screen.
    pub fn cache_key(&self) -> Option<CacheKey> {
        match self {
            ScreenKind::Login => None,
            ScreenKind::ProjectList => Some(CacheKey::projects()),
            ScreenKind::RepositoryList { project } => Some(CacheKey::repositories(project)),
            ScreenKind::ArtifactList { repository } => Some(CacheKey::artifacts(repository)),
        }
    }

    pub fn title(&self) -> String {
        match self {
            ScreenKind::Login => "Login".to_string(),
            ScreenKind::ProjectList => "Projects".to_string(),
            ScreenKind::RepositoryList { project } => format!("Repositories in {}", project),
            ScreenKind::ArtifactList { repository } => format!("Artifacts in {}", repository),
        }
    }
}

/// Data last loaded into a screen.
#[derive(Debug, Clone)]
pub enum ScreenData {
    Projects(Arc<Vec<Project>>),
    Repositories(Arc<Vec<Repository>>),
    Artifacts(Arc<ArtifactCollection>),
}

/// Everything a screen holds between visits.
#[derive(Debug, Clone)]
pub struct ScreenState {
    pub id: ScreenId,
    pub kind: ScreenKind,
    pub installed: bool,
    /// Bumped on every explicit refetch; results carrying an older value are dropped.
    pub generation: u64,
    pub options: OptionList,
    pub data: Option<ScreenData>,
    pub from_cache: bool,
    pub loading: bool,
    /// Transient message, e.g. the last fetch error.
    pub notice: Option<String>,
    /// Only artifact screens filter.
    pub pipeline: Option<FilterPipeline>,
    /// Last report computed from `data` and `pipeline`. Artifact rows are
    /// built from it.
    pub report: Option<FilterReport>,
}

impl ScreenState {
    pub fn new(id: ScreenId, kind: ScreenKind) -> Self {
        let pipeline = matches!(kind, ScreenKind::ArtifactList { .. }).then(default_pipeline);
        Self {
            id,
            kind,
            installed: false,
            generation: 0,
            options: OptionList::default(),
            data: None,
            from_cache: false,
            loading: false,
            notice: None,
            pipeline,
            report: None,
        }
    }

    pub fn title(&self) -> String {
        self.kind.title()
    }

    /// What a report is computed from: the loaded artifacts and a copy of
    /// the filters. `None` for other screens or before the first load.
    pub fn filter_inputs(&self) -> Option<(Arc<ArtifactCollection>, FilterPipeline)> {
        match (&self.data, &self.pipeline) {
            (Some(ScreenData::Artifacts(collection)), Some(pipeline)) => {
                Some((Arc::clone(collection), pipeline.clone()))
            }
            _ => None,
        }
    }

    /// Rebuilds the option rows from the loaded data, or from the stored
    /// report on artifact screens. Never runs the filters itself.
    pub fn rebuild_options(&mut self) {
        let items = match &self.data {
            None => Vec::new(),
            Some(ScreenData::Projects(projects)) => projects
                .iter()
                .filter_map(|p| {
                    let name = p.name.as_deref()?;
                    let label = match p.repo_count {
                        Some(count) => format!("{} ({} repositories)", name, count),
                        None => name.to_string(),
                    };
                    Some(ScreenOption::new(label, Some(ScreenId::project(name))))
                })
                .collect(),
            Some(ScreenData::Repositories(repositories)) => repositories
                .iter()
                .map(|r| {
                    let label = match r.artifact_count {
                        Some(count) => format!("{} ({} artifacts)", r.name, count),
                        None => r.name.clone(),
                    };
                    ScreenOption::new(label, Some(ScreenId::repository(&r.name)))
                })
                .collect(),
            Some(ScreenData::Artifacts(_)) => self
                .report
                .as_ref()
                .map(|report| {
                    report
                        .artifacts
                        .iter()
                        .map(|record| {
                            let severity = record.max_severity().map_or("clean", |s| s.as_str());
                            ScreenOption::new(
                                format!(
                                    "{} [{}] {} findings",
                                    record.name_with_digest(),
                                    severity,
                                    record.findings.len()
                                ),
                                None,
                            )
                        })
                        .collect()
                })
                .unwrap_or_default(),
        };
        self.options.replace(items);
    }
}
