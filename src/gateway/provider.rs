use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::errors::HarborError;
use crate::models::{ArtifactRecord, Project, Repository};
use super::types::CallDiagnostics;

/// An authenticated view of a remote registry.
#[async_trait]
pub trait RegistryGateway: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, HarborError>;

    async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>, HarborError>;

    /// `repository` is the full "project/repo" name.
    async fn list_artifacts(&self, repository: &str) -> Result<Vec<ArtifactRecord>, HarborError>;

    /// Method, URL and status of the most recent request, if any, across
    /// all callers. Implementations also [`CallDiagnostics::note`] each
    /// request so a single fetch can be attributed.
    fn last_call_diagnostics(&self) -> Option<CallDiagnostics>;

    /// Gateway name for logging
    fn gateway_name(&self) -> &str;
}

/// Turns login credentials into a ready gateway, verifying them on the way.
#[async_trait]
pub trait GatewayConnector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn RegistryGateway>, HarborError>;
}
