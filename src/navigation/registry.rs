use crate::errors::HarborError;
use crate::models::Repository;
use super::screen::{ScreenId, ScreenKind, ScreenState};

/// Builds a screen from the part of the id after the registered prefix.
pub type ScreenFactory = fn(&ScreenId, &str) -> Result<ScreenState, HarborError>;

struct Registration {
    prefix: &'static str,
    /// Exact ids match only the whole string; prefixes end in ':'.
    exact: bool,
    factory: ScreenFactory,
}

/// Maps screen ids to the factories that create them.
pub struct ScreenRegistry {
    registrations: Vec<Registration>,
}

impl Default for ScreenRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ScreenId::LOGIN, login_screen);
        registry.register(ScreenId::PROJECTS, project_list_screen);
        registry.register(ScreenId::PROJECT_PREFIX, repository_list_screen);
        registry.register(ScreenId::REPOSITORY_PREFIX, artifact_list_screen);
        registry
    }
}

impl ScreenRegistry {
    pub fn empty() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Later registrations for the same prefix replace earlier ones.
    pub fn register(&mut self, prefix: &'static str, factory: ScreenFactory) {
        self.registrations.retain(|r| r.prefix != prefix);
        self.registrations.push(Registration {
            prefix,
            exact: !prefix.ends_with(':'),
            factory,
        });
    }

    pub fn prefixes(&self) -> Vec<&'static str> {
        self.registrations.iter().map(|r| r.prefix).collect()
    }

    /// Creates a fresh, not yet installed screen for `id`.
    pub fn create(&self, id: &ScreenId) -> Result<ScreenState, HarborError> {
        let raw = id.as_str();
        for registration in &self.registrations {
            let rest = if registration.exact {
                (raw == registration.prefix).then_some("")
            } else {
                raw.strip_prefix(registration.prefix)
            };
            if let Some(rest) = rest {
                return (registration.factory)(id, rest);
            }
        }
        Err(HarborError::Navigation(format!("no screen registered for '{}'", id)))
    }
}

fn login_screen(id: &ScreenId, _: &str) -> Result<ScreenState, HarborError> {
    Ok(ScreenState::new(id.clone(), ScreenKind::Login))
}

fn project_list_screen(id: &ScreenId, _: &str) -> Result<ScreenState, HarborError> {
    Ok(ScreenState::new(id.clone(), ScreenKind::ProjectList))
}

fn repository_list_screen(id: &ScreenId, project: &str) -> Result<ScreenState, HarborError> {
    let project = project.trim();
    if project.is_empty() || project.contains('/') {
        return Err(HarborError::Navigation(format!("'{}' is not a project name", project)));
    }
    Ok(ScreenState::new(
        id.clone(),
        ScreenKind::RepositoryList {
            project: project.to_string(),
        },
    ))
}

fn artifact_list_screen(id: &ScreenId, repository: &str) -> Result<ScreenState, HarborError> {
    let repository = repository.trim();
    if Repository::split_name(repository).is_none() {
        return Err(HarborError::Navigation(format!(
            "'{}' is not a project/repository name",
            repository
        )));
    }
    Ok(ScreenState::new(
        id.clone(),
        ScreenKind::ArtifactList {
            repository: repository.to_string(),
        },
    ))
}
