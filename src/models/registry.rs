use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Harbor project as returned by `GET /projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub repo_count: Option<u64>,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
}

/// A repository inside a project. `name` is the full "project/repo" path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub project_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub artifact_count: Option<u64>,
    #[serde(default)]
    pub pull_count: Option<u64>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
}

impl Repository {
    /// Splits "library/nginx" into ("library", "nginx"). Nested repository
    /// paths keep everything after the first slash.
    pub fn split_name(full_name: &str) -> Option<(&str, &str)> {
        full_name
            .split_once('/')
            .filter(|(project, repo)| !project.is_empty() && !repo.is_empty())
    }

    pub fn project_name(&self) -> Option<&str> {
        Self::split_name(&self.name).map(|(project, _)| project)
    }
}
