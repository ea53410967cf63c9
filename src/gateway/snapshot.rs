use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Credentials;
use crate::errors::HarborError;
use crate::models::{ArtifactRecord, Project, Repository};
use super::provider::{GatewayConnector, RegistryGateway};
use super::types::{CallDiagnostics, Operation};

/// Registry contents saved to disk, for offline browsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Keyed by project name.
    #[serde(default)]
    pub repositories: HashMap<String, Vec<Repository>>,
    /// Keyed by full repository name.
    #[serde(default)]
    pub artifacts: HashMap<String, Vec<ArtifactRecord>>,
}

impl RegistrySnapshot {
    pub async fn load(path: &Path) -> Result<Self, HarborError> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Serves a [`RegistrySnapshot`] from memory and counts every call.
pub struct SnapshotGateway {
    snapshot: RegistrySnapshot,
    latency: Option<Duration>,
    calls: [AtomicUsize; 3],
    last_call: Mutex<Option<CallDiagnostics>>,
}

impl SnapshotGateway {
    pub fn new(snapshot: RegistrySnapshot) -> Self {
        Self {
            snapshot,
            latency: None,
            calls: Default::default(),
            last_call: Mutex::new(None),
        }
    }

    /// Delay every call, to mimic a slow registry.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// How many times `op` has been invoked.
    pub fn calls(&self, op: Operation) -> usize {
        self.calls[slot(op)].load(Ordering::SeqCst)
    }

    async fn enter(&self, op: Operation, target: String, found: bool) {
        self.calls[slot(op)].fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let diagnostics = CallDiagnostics {
            method: "GET".to_string(),
            url: format!("snapshot://{}", target),
            status_code: Some(if found { 200 } else { 404 }),
        };
        diagnostics.note();
        if let Ok(mut last) = self.last_call.lock() {
            *last = Some(diagnostics);
        }
    }
}

fn slot(op: Operation) -> usize {
    match op {
        Operation::ListProjects => 0,
        Operation::ListRepositories => 1,
        Operation::ListArtifacts => 2,
    }
}

#[async_trait]
impl RegistryGateway for SnapshotGateway {
    async fn list_projects(&self) -> Result<Vec<Project>, HarborError> {
        self.enter(Operation::ListProjects, "projects".into(), true).await;
        Ok(self.snapshot.projects.clone())
    }

    async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>, HarborError> {
        let repos = self.snapshot.repositories.get(project);
        self.enter(Operation::ListRepositories, format!("projects/{}", project), repos.is_some())
            .await;
        repos.cloned().ok_or_else(|| HarborError::Api {
            status: 404,
            message: format!("project {} not found", project),
        })
    }

    async fn list_artifacts(&self, repository: &str) -> Result<Vec<ArtifactRecord>, HarborError> {
        let artifacts = self.snapshot.artifacts.get(repository);
        self.enter(Operation::ListArtifacts, format!("repositories/{}", repository), artifacts.is_some())
            .await;
        artifacts.cloned().ok_or_else(|| HarborError::Api {
            status: 404,
            message: format!("repository {} not found", repository),
        })
    }

    fn last_call_diagnostics(&self) -> Option<CallDiagnostics> {
        self.last_call.lock().ok().and_then(|last| last.clone())
    }

    fn gateway_name(&self) -> &str {
        "snapshot"
    }
}

/// Hands out one shared [`SnapshotGateway`]; accepts any non-blank login.
pub struct SnapshotConnector {
    gateway: Arc<SnapshotGateway>,
}

impl SnapshotConnector {
    pub fn new(gateway: Arc<SnapshotGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl GatewayConnector for SnapshotConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn RegistryGateway>, HarborError> {
        if !credentials.missing_fields().is_empty() {
            return Err(HarborError::Authentication("credentials are incomplete".into()));
        }
        info!(user = %credentials.username, "Opening registry snapshot");
        Ok(self.gateway.clone())
    }
}
