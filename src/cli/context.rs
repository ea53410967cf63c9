use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{Credentials, HarborTuiConfig};
use crate::errors::HarborError;
use crate::gateway::{GatewayConnector, HarborConnector, RegistrySnapshot, SnapshotConnector, SnapshotGateway};
use crate::navigation::{ScreenRegistry, SessionNavigator};

const SNAPSHOT_USER: &str = "offline";

/// What every command needs: the loaded config and a way to log in.
pub struct AppContext {
    pub config: HarborTuiConfig,
    pub connector: Arc<dyn GatewayConnector>,
    snapshot: Option<PathBuf>,
}

impl AppContext {
    /// Uses the snapshot at `snapshot` when given, otherwise the live registry
    /// configured in `config.harbor`.
    pub async fn build(config: HarborTuiConfig, snapshot: Option<&Path>) -> Result<Self, HarborError> {
        let connector: Arc<dyn GatewayConnector> = match snapshot {
            Some(path) => {
                let loaded = RegistrySnapshot::load(path).await.map_err(|e| {
                    HarborError::Config(format!("Cannot load snapshot {}: {}", path.display(), e))
                })?;
                info!(
                    path = %path.display(),
                    projects = loaded.projects.len(),
                    "Loaded registry snapshot"
                );
                Arc::new(SnapshotConnector::new(Arc::new(SnapshotGateway::new(loaded))))
            }
            None => Arc::new(HarborConnector::new(config.harbor.clone())),
        };
        Ok(Self {
            config,
            connector,
            snapshot: snapshot.map(Path::to_path_buf),
        })
    }

    pub fn is_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Credentials from the config. Snapshots need no real login, so they
    /// fall back to a placeholder account.
    pub fn stored_credentials(&self) -> Option<Credentials> {
        if self.config.harbor.can_authenticate() {
            match self.config.harbor.credentials() {
                Ok(credentials) => return Some(credentials),
                Err(e) => warn!(error = %e, "Configured credentials are unusable"),
            }
        }
        self.snapshot.as_ref().map(|path| {
            Credentials::new(
                &format!("snapshot://{}", path.display()),
                SNAPSHOT_USER.to_string(),
                SNAPSHOT_USER.to_string(),
            )
        })
    }

    /// A navigator that has not logged in yet, starting from the stored
    /// credentials when there are any.
    pub fn navigator(&self) -> SessionNavigator {
        SessionNavigator::new(
            self.connector.clone(),
            ScreenRegistry::default(),
            self.stored_credentials(),
            self.config.session.call_log_capacity,
        )
    }

    /// Logs in non-interactively. The navigator comes back browsing the
    /// project list.
    pub async fn login(&self) -> Result<SessionNavigator, HarborError> {
        let credentials = match self.stored_credentials() {
            Some(credentials) => credentials,
            None => self.config.harbor.credentials()?,
        };
        let mut navigator = SessionNavigator::new(
            self.connector.clone(),
            ScreenRegistry::default(),
            None,
            self.config.session.call_log_capacity,
        );
        navigator.login(credentials).await?;
        Ok(navigator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::navigation::ScreenId;

    fn snapshot_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"projects": [{{"project_id": 1, "name": "library", "repo_count": 1}}],
                "repositories": {{"library": [{{"name": "library/nginx"}}]}}}}"#
        )
        .unwrap();
        file
    }

    #[tokio::test]
    async fn test_snapshot_needs_no_configured_login() {
        let file = snapshot_file();
        let ctx = AppContext::build(HarborTuiConfig::default(), Some(file.path())).await.unwrap();
        assert!(ctx.is_snapshot());
        let credentials = ctx.stored_credentials().unwrap();
        assert!(credentials.url.starts_with("snapshot://"));

        let mut navigator = ctx.login().await.unwrap();
        assert!(navigator.is_browsing());
        assert_eq!(navigator.gateway_name(), Some("snapshot"));
        navigator.load(&ScreenId::projects()).await.unwrap();
        assert_eq!(navigator.current().unwrap().options.len(), 1);
    }

    #[tokio::test]
    async fn test_live_registry_without_credentials_is_config_error() {
        let ctx = AppContext::build(HarborTuiConfig::default(), None).await.unwrap();
        assert!(ctx.stored_credentials().is_none());
        assert!(matches!(ctx.login().await, Err(HarborError::Config(_))));
        assert!(!ctx.navigator().is_browsing());
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_config_error() {
        let result = AppContext::build(HarborTuiConfig::default(), Some(Path::new("/nonexistent/snap.json"))).await;
        assert!(matches!(result, Err(HarborError::Config(_))));
    }
}
