use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CachedValue, CachingFacade, LastCall};
use crate::config::Credentials;
use crate::errors::HarborError;
use crate::filters::{FilterPipeline, FilterReport, FilterValue, SortOrder};
use crate::gateway::{GatewayConnector, Operation};
use super::options::ScreenOption;
use super::registry::ScreenRegistry;
use super::screen::{ScreenData, ScreenId, ScreenState};

/// Visible screens, root first. An id appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationStack {
    ids: Vec<ScreenId>,
}

impl NavigationStack {
    pub fn with_root(root: ScreenId) -> Self {
        Self { ids: vec![root] }
    }

    pub fn top(&self) -> Option<&ScreenId> {
        self.ids.last()
    }

    pub fn depth(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[ScreenId] {
        &self.ids
    }

    pub fn contains(&self, id: &ScreenId) -> bool {
        self.ids.contains(id)
    }

    /// Pushing the top is a no-op; pushing an id already lower in the stack
    /// unwinds back to it.
    fn push(&mut self, id: ScreenId) {
        match self.ids.iter().position(|existing| *existing == id) {
            Some(index) => self.ids.truncate(index + 1),
            None => self.ids.push(id),
        }
    }

    /// The root is never popped.
    fn pop(&mut self) -> Option<ScreenId> {
        if self.ids.len() > 1 {
            self.ids.pop()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionState {
    LoggedOut {
        failed_attempts: u32,
        last_error: Option<String>,
    },
    Authenticating {
        credentials: Credentials,
        /// 1 for the first try, counting failures since the last success.
        attempt: u32,
    },
    Browsing {
        stack: NavigationStack,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::LoggedOut { .. } => "logged out",
            SessionState::Authenticating { .. } => "authenticating",
            SessionState::Browsing { .. } => "browsing",
        }
    }
}

/// A pending load for one screen. Holds its own facade handle so it can run
/// on another task while the navigator keeps taking input.
pub struct FetchTicket {
    pub id: ScreenId,
    pub generation: u64,
    key: CacheKey,
    facade: Arc<CachingFacade>,
}

impl FetchTicket {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub async fn run(self) -> FetchOutcome {
        let result = self.facade.call(&self.key).await;
        FetchOutcome {
            id: self.id,
            generation: self.generation,
            result,
        }
    }
}

pub struct FetchOutcome {
    pub id: ScreenId,
    pub generation: u64,
    pub result: Result<CachedValue, HarborError>,
}

/// Login state plus the stack of installed screens.
///
/// Screens are created once per id through the [`ScreenRegistry`] and kept
/// until logout, so returning to a screen reuses its data, focus and filters.
pub struct SessionNavigator {
    connector: Arc<dyn GatewayConnector>,
    registry: ScreenRegistry,
    state: SessionState,
    facade: Option<Arc<CachingFacade>>,
    screens: HashMap<ScreenId, ScreenState>,
    next_generation: u64,
    call_log_capacity: usize,
}

impl SessionNavigator {
    /// Starts in `Authenticating` when complete stored credentials are given,
    /// otherwise in `LoggedOut`.
    pub fn new(
        connector: Arc<dyn GatewayConnector>,
        registry: ScreenRegistry,
        stored: Option<Credentials>,
        call_log_capacity: usize,
    ) -> Self {
        let state = match stored {
            Some(credentials) if credentials.missing_fields().is_empty() => {
                SessionState::Authenticating { credentials, attempt: 1 }
            }
            _ => SessionState::LoggedOut {
                failed_attempts: 0,
                last_error: None,
            },
        };
        Self {
            connector,
            registry,
            state,
            facade: None,
            screens: HashMap::new(),
            next_generation: 1,
            call_log_capacity,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_browsing(&self) -> bool {
        matches!(self.state, SessionState::Browsing { .. })
    }

    pub fn stack(&self) -> Option<&NavigationStack> {
        match &self.state {
            SessionState::Browsing { stack } => Some(stack),
            _ => None,
        }
    }

    pub fn screen(&self, id: &ScreenId) -> Option<&ScreenState> {
        self.screens.get(id)
    }

    pub fn installed_count(&self) -> usize {
        self.screens.len()
    }

    pub fn current(&self) -> Option<&ScreenState> {
        self.stack()?.top().and_then(|id| self.screens.get(id))
    }

    fn current_mut(&mut self) -> Result<&mut ScreenState, HarborError> {
        let id = self
            .stack()
            .and_then(|stack| stack.top().cloned())
            .ok_or_else(|| HarborError::Navigation("not logged in".into()))?;
        self.screens
            .get_mut(&id)
            .ok_or_else(|| HarborError::Internal(format!("screen {} is on the stack but not installed", id)))
    }

    fn stack_mut(&mut self) -> Result<&mut NavigationStack, HarborError> {
        match &mut self.state {
            SessionState::Browsing { stack } => Ok(stack),
            other => Err(HarborError::Navigation(format!(
                "cannot navigate while {}",
                other.name()
            ))),
        }
    }

    fn bump_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    /// `LoggedOut -> Authenticating`. Blank fields are rejected and the
    /// session stays logged out.
    pub fn submit_credentials(&mut self, credentials: Credentials) -> Result<(), HarborError> {
        let failed_attempts = match &self.state {
            SessionState::LoggedOut { failed_attempts, .. } => *failed_attempts,
            other => {
                return Err(HarborError::Navigation(format!(
                    "cannot log in while {}",
                    other.name()
                )))
            }
        };
        let missing = credentials.missing_fields();
        if !missing.is_empty() {
            debug!(missing = ?missing, "Login form incomplete");
            let message = "Please fill in all fields".to_string();
            self.state = SessionState::LoggedOut {
                failed_attempts,
                last_error: Some(message.clone()),
            };
            return Err(HarborError::Validation(message));
        }
        self.state = SessionState::Authenticating {
            credentials,
            attempt: failed_attempts + 1,
        };
        Ok(())
    }

    /// `Authenticating -> Browsing([projects])` on success, back to
    /// `LoggedOut` on failure. Nothing is retried; the user has to submit
    /// credentials again.
    pub async fn authenticate(&mut self) -> Result<(), HarborError> {
        let (credentials, attempt) = match &self.state {
            SessionState::Authenticating { credentials, attempt } => (credentials.clone(), *attempt),
            other => {
                return Err(HarborError::Navigation(format!(
                    "no login in progress ({})",
                    other.name()
                )))
            }
        };
        match self.connector.connect(&credentials).await {
            Ok(gateway) => {
                info!(
                    url = %credentials.url,
                    user = %credentials.username,
                    gateway = gateway.gateway_name(),
                    "Logged in"
                );
                self.facade = Some(Arc::new(CachingFacade::new(gateway, self.call_log_capacity)));
                self.screens.clear();
                let root = ScreenId::projects();
                self.install(&root)?;
                self.state = SessionState::Browsing {
                    stack: NavigationStack::with_root(root),
                };
                Ok(())
            }
            Err(e) => {
                let err = match e {
                    HarborError::Authentication(_) => e,
                    other => HarborError::Authentication(format!("Login failed: {}", other)),
                };
                warn!(url = %credentials.url, attempt, error = %err, "Login failed");
                self.state = SessionState::LoggedOut {
                    failed_attempts: attempt,
                    last_error: Some(err.to_string()),
                };
                Err(err)
            }
        }
    }

    /// Submit then authenticate.
    pub async fn login(&mut self, credentials: Credentials) -> Result<(), HarborError> {
        self.submit_credentials(credentials)?;
        self.authenticate().await
    }

    /// Drops the facade and every installed screen.
    pub fn logout(&mut self) {
        if self.facade.take().is_some() {
            info!("Logged out");
        }
        self.screens.clear();
        self.state = SessionState::LoggedOut {
            failed_attempts: 0,
            last_error: None,
        };
    }

    fn install(&mut self, id: &ScreenId) -> Result<bool, HarborError> {
        if self.screens.contains_key(id) {
            return Ok(false);
        }
        let mut screen = self.registry.create(id)?;
        screen.installed = true;
        screen.generation = self.bump_generation();
        debug!(screen = %id, "Screen installed");
        self.screens.insert(id.clone(), screen);
        Ok(true)
    }

    /// Shows `id`, creating its screen the first time. An unknown id is a
    /// `Navigation` error and leaves the stack as it was.
    pub fn push(&mut self, id: &ScreenId) -> Result<(), HarborError> {
        let stack = self.stack_mut()?;
        if stack.top() == Some(id) {
            return Ok(());
        }
        self.install(id)?;
        self.stack_mut()?.push(id.clone());
        Ok(())
    }

    /// Returns the popped id; `None` at the root.
    pub fn pop(&mut self) -> Option<ScreenId> {
        match &mut self.state {
            SessionState::Browsing { stack } => stack.pop(),
            _ => None,
        }
    }

    /// Whether the screen has never received data and is not loading.
    pub fn needs_load(&self, id: &ScreenId) -> bool {
        self.screens
            .get(id)
            .is_some_and(|s| s.data.is_none() && !s.loading && s.kind.cache_key().is_some())
    }

    /// Captures what is needed to load `id` without borrowing the navigator.
    pub fn begin_fetch(&mut self, id: &ScreenId) -> Result<FetchTicket, HarborError> {
        let facade = self
            .facade
            .clone()
            .ok_or_else(|| HarborError::Navigation("not logged in".into()))?;
        let screen = self
            .screens
            .get_mut(id)
            .ok_or_else(|| HarborError::Navigation(format!("screen {} is not installed", id)))?;
        let key = screen
            .kind
            .cache_key()
            .ok_or_else(|| HarborError::Navigation(format!("screen {} has nothing to load", id)))?;
        screen.loading = true;
        Ok(FetchTicket {
            id: id.clone(),
            generation: screen.generation,
            key,
            facade,
        })
    }

    /// Applies a finished fetch. `Ok(false)` means the result was dropped
    /// because the screen is gone or was refreshed since. A fetch error
    /// becomes the screen's notice, keeps the previous data, and is returned.
    pub async fn complete_fetch(&mut self, outcome: FetchOutcome) -> Result<bool, HarborError> {
        let Some(screen) = self.screens.get_mut(&outcome.id) else {
            debug!(screen = %outcome.id, "Dropping fetch for uninstalled screen");
            return Ok(false);
        };
        if screen.generation != outcome.generation {
            debug!(
                screen = %outcome.id,
                stale = outcome.generation,
                current = screen.generation,
                "Dropping stale fetch"
            );
            return Ok(false);
        }
        screen.loading = false;
        match outcome.result {
            Ok(value) => {
                screen.from_cache = value.from_cache();
                screen.data = Some(match value {
                    CachedValue::Projects(f) => ScreenData::Projects(f.value),
                    CachedValue::Repositories(f) => ScreenData::Repositories(f.value),
                    CachedValue::Artifacts(f) => ScreenData::Artifacts(f.value),
                });
                screen.notice = None;
                screen.report = None;
                self.refilter(&outcome.id).await?;
                Ok(true)
            }
            Err(err) => {
                warn!(screen = %outcome.id, error = %err, "Fetch failed");
                screen.notice = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Loads `id` in place.
    pub async fn load(&mut self, id: &ScreenId) -> Result<(), HarborError> {
        let ticket = self.begin_fetch(id)?;
        let outcome = ticket.run().await;
        self.complete_fetch(outcome).await.map(|_| ())
    }

    /// Starts a refetch: newer generation, cache key dropped. Results of
    /// fetches begun earlier will be discarded.
    pub fn refresh(&mut self, id: &ScreenId) -> Result<FetchTicket, HarborError> {
        let generation = self.bump_generation();
        let screen = self
            .screens
            .get_mut(id)
            .ok_or_else(|| HarborError::Navigation(format!("screen {} is not installed", id)))?;
        screen.generation = generation;
        if let (Some(facade), Some(key)) = (&self.facade, screen.kind.cache_key()) {
            facade.invalidate_key(&key);
        }
        self.begin_fetch(id)
    }

    /// Recomputes the report of an artifact screen on the blocking pool and
    /// rebuilds its rows. Other screens only rebuild rows.
    async fn refilter(&mut self, id: &ScreenId) -> Result<(), HarborError> {
        let inputs = self.screens.get(id).and_then(ScreenState::filter_inputs);
        let report = match inputs {
            Some((collection, pipeline)) => Some(pipeline.run_offloaded(collection).await?),
            None => None,
        };
        let screen = self
            .screens
            .get_mut(id)
            .ok_or_else(|| HarborError::Navigation(format!("screen {} is not installed", id)))?;
        if report.is_some() {
            screen.report = report;
        }
        screen.rebuild_options();
        Ok(())
    }

    pub fn select_next(&mut self) -> Result<Option<ScreenOption>, HarborError> {
        Ok(self.current_mut()?.options.select_next().cloned())
    }

    pub fn select_prev(&mut self) -> Result<Option<ScreenOption>, HarborError> {
        Ok(self.current_mut()?.options.select_prev().cloned())
    }

    pub fn select(&mut self, index: usize) -> Result<Option<ScreenOption>, HarborError> {
        Ok(self.current_mut()?.options.select(index).cloned())
    }

    /// Pushes the focused option's target, if it has one.
    pub fn activate_selected(&mut self) -> Result<Option<ScreenId>, HarborError> {
        let target = self
            .current_mut()?
            .options
            .selected_option()
            .and_then(|o| o.target.clone());
        match target {
            Some(id) => {
                self.push(&id)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Runs `change` on the current screen's filters, then refilters.
    async fn change_filters<F>(&mut self, change: F) -> Result<(), HarborError>
    where
        F: FnOnce(&mut FilterPipeline) -> Result<(), HarborError>,
    {
        let screen = self.current_mut()?;
        let pipeline = screen
            .pipeline
            .as_mut()
            .ok_or_else(|| HarborError::Navigation("this screen has no filters".into()))?;
        change(pipeline)?;
        let id = screen.id.clone();
        self.refilter(&id).await
    }

    pub async fn set_filter(&mut self, name: &str, value: FilterValue) -> Result<(), HarborError> {
        self.change_filters(|pipeline| pipeline.set_value(name, value)).await
    }

    pub async fn clear_filters(&mut self, name: Option<&str>) -> Result<(), HarborError> {
        self.change_filters(|pipeline| pipeline.clear(name)).await
    }

    pub async fn set_sort(&mut self, sort: SortOrder) -> Result<(), HarborError> {
        self.change_filters(|pipeline| {
            pipeline.set_sort(sort);
            Ok(())
        })
        .await
    }

    /// Replaces every filter of the current artifact screen at once.
    pub async fn set_pipeline(&mut self, replacement: FilterPipeline) -> Result<(), HarborError> {
        self.change_filters(|pipeline| {
            *pipeline = replacement;
            Ok(())
        })
        .await
    }

    /// The current artifact screen's report, as of the last load or filter
    /// change.
    pub fn report(&self) -> Result<&FilterReport, HarborError> {
        let screen = self
            .current()
            .ok_or_else(|| HarborError::Navigation("not logged in".into()))?;
        if screen.pipeline.is_none() {
            return Err(HarborError::Navigation("this screen has no filters".into()));
        }
        screen
            .report
            .as_ref()
            .ok_or_else(|| HarborError::Navigation("artifacts are not loaded yet".into()))
    }

    /// Drops cached results for `operation`, or all of them. The loaded
    /// screens keep their data until refreshed.
    pub fn invalidate_cache(&self, operation: Option<Operation>) -> Result<(), HarborError> {
        self.logged_in_facade()?.invalidate(operation);
        Ok(())
    }

    /// Cached keys with their fetch times, sorted. Empty when logged out.
    pub fn cached_keys(&self) -> Vec<(CacheKey, Option<DateTime<Utc>>)> {
        self.facade
            .as_ref()
            .map(|facade| {
                facade
                    .cached_keys()
                    .into_iter()
                    .map(|key| {
                        let fetched_at = facade.fetched_at(&key);
                        (key, fetched_at)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Recent registry calls, oldest first. Empty when logged out.
    pub fn call_log(&self) -> Vec<String> {
        self.facade
            .as_ref()
            .map(|facade| facade.call_log().lines())
            .unwrap_or_default()
    }

    pub fn last_call(&self) -> Option<LastCall> {
        self.facade.as_ref().and_then(|facade| facade.last_call())
    }

    pub fn gateway_name(&self) -> Option<&str> {
        self.facade.as_ref().map(|facade| facade.gateway_name())
    }

    fn logged_in_facade(&self) -> Result<&CachingFacade, HarborError> {
        self.facade
            .as_deref()
            .ok_or_else(|| HarborError::Navigation("not logged in".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Operation, RegistrySnapshot, SnapshotConnector, SnapshotGateway};
    use std::time::Duration;

    fn snapshot() -> RegistrySnapshot {
        serde_json::from_value(serde_json::json!({
            "projects": [
                {"project_id": 1, "name": "library", "repo_count": 2},
                {"project_id": 2, "name": "team"}
            ],
            "repositories": {
                "library": [{"name": "library/nginx", "artifact_count": 2}, {"name": "library/redis"}],
                "team": []
            },
            "artifacts": {
                "library/nginx": [
                    {"digest": "sha256:aaaa", "repository": "library/nginx", "tags": ["1.25"],
                     "findings": [{"id": "CVE-2023-1111", "severity": "High", "package": "openssl",
                                   "fix_version": "3.0.9", "description": "overflow"}]},
                    {"digest": "sha256:bbbb", "repository": "library/nginx", "tags": ["1.24"],
                     "findings": [{"id": "CVE-2022-9999", "severity": "Low", "package": "zlib",
                                   "description": "leak"}]}
                ]
            }
        }))
        .unwrap()
    }

    fn credentials(secret: &str) -> Credentials {
        Credentials::new("https://harbor.example.com", "admin".into(), secret.into())
    }

    fn navigator_with(gateway: Arc<SnapshotGateway>, stored: Option<Credentials>) -> SessionNavigator {
        SessionNavigator::new(
            Arc::new(SnapshotConnector::new(gateway)),
            ScreenRegistry::default(),
            stored,
            16,
        )
    }

    fn navigator() -> SessionNavigator {
        navigator_with(Arc::new(SnapshotGateway::new(snapshot())), None)
    }

    async fn browsing() -> SessionNavigator {
        let mut nav = navigator();
        nav.login(credentials("secret")).await.unwrap();
        nav
    }

    #[test]
    fn test_initial_state_depends_on_stored_credentials() {
        let gateway = Arc::new(SnapshotGateway::new(snapshot()));
        let nav = navigator_with(gateway.clone(), None);
        assert!(matches!(nav.state(), SessionState::LoggedOut { failed_attempts: 0, .. }));

        let nav = navigator_with(gateway.clone(), Some(credentials("")));
        assert!(matches!(nav.state(), SessionState::LoggedOut { .. }));

        let nav = navigator_with(gateway, Some(credentials("secret")));
        assert!(matches!(nav.state(), SessionState::Authenticating { attempt: 1, .. }));
    }

    #[tokio::test]
    async fn test_login_enters_browsing_at_project_list() {
        let nav = browsing().await;
        let stack = nav.stack().unwrap();
        assert_eq!(stack.ids(), &[ScreenId::projects()]);
        assert!(nav.current().unwrap().installed);
        assert!(nav.gateway_name().is_some());
    }

    #[tokio::test]
    async fn test_blank_fields_are_rejected() {
        let mut nav = navigator();
        let err = nav.submit_credentials(credentials("")).unwrap_err();
        assert!(matches!(err, HarborError::Validation(ref m) if m == "Please fill in all fields"));
        assert!(matches!(nav.state(), SessionState::LoggedOut { .. }));
    }

    #[tokio::test]
    async fn test_auth_failure_returns_to_logged_out_without_retry() {
        struct Refusing;

        #[async_trait::async_trait]
        impl GatewayConnector for Refusing {
            async fn connect(
                &self,
                _: &Credentials,
            ) -> Result<Arc<dyn crate::gateway::RegistryGateway>, HarborError> {
                Err(HarborError::Network("connection refused".into()))
            }
        }

        let mut nav = SessionNavigator::new(Arc::new(Refusing), ScreenRegistry::default(), None, 8);
        let err = nav.login(credentials("secret")).await.unwrap_err();
        assert!(matches!(err, HarborError::Authentication(_)));
        assert!(matches!(nav.state(), SessionState::LoggedOut { failed_attempts: 1, .. }));
        // authenticate() does nothing until credentials are submitted again
        assert!(nav.authenticate().await.is_err());

        let _ = nav.login(credentials("secret")).await;
        assert!(matches!(nav.state(), SessionState::LoggedOut { failed_attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_push_same_id_twice_installs_once() {
        let mut nav = browsing().await;
        let id = ScreenId::project("library");
        nav.push(&id).unwrap();
        nav.push(&id).unwrap();
        assert_eq!(nav.stack().unwrap().depth(), 2);
        assert_eq!(nav.installed_count(), 2);
    }

    #[tokio::test]
    async fn test_spelling_variants_install_one_screen() {
        let mut nav = browsing().await;
        nav.push(&ScreenId::project("library")).unwrap();
        nav.push(&ScreenId::new("project:Library")).unwrap();
        nav.push(&ScreenId::new("project: library")).unwrap();
        nav.push(&ScreenId::new("project:library/")).unwrap();
        assert_eq!(nav.installed_count(), 2);
        assert_eq!(
            nav.stack().unwrap().ids(),
            &[ScreenId::projects(), ScreenId::project("library")]
        );
    }

    #[tokio::test]
    async fn test_pop_at_root_is_noop() {
        let mut nav = browsing().await;
        assert_eq!(nav.pop(), None);
        assert_eq!(nav.stack().unwrap().depth(), 1);
    }

    #[tokio::test]
    async fn test_unknown_screen_leaves_stack_unchanged() {
        let mut nav = browsing().await;
        let err = nav.push(&ScreenId::new("settings")).unwrap_err();
        assert!(matches!(err, HarborError::Navigation(_)));
        assert_eq!(nav.stack().unwrap().ids(), &[ScreenId::projects()]);
    }

    #[tokio::test]
    async fn test_push_while_logged_out_is_navigation_error() {
        let mut nav = navigator();
        assert!(matches!(
            nav.push(&ScreenId::projects()),
            Err(HarborError::Navigation(_))
        ));
    }

    #[tokio::test]
    async fn test_revisited_screen_reuses_state() {
        let mut nav = browsing().await;
        let library = ScreenId::project("library");
        nav.push(&library).unwrap();
        nav.load(&library).await.unwrap();
        nav.select_next().unwrap();
        assert_eq!(nav.pop(), Some(library.clone()));

        nav.push(&library).unwrap();
        let screen = nav.current().unwrap();
        assert_eq!(screen.options.selected_index(), Some(1));
        assert!(!nav.needs_load(&library));
    }

    #[tokio::test]
    async fn test_push_lower_screen_unwinds() {
        let mut nav = browsing().await;
        nav.push(&ScreenId::project("library")).unwrap();
        nav.push(&ScreenId::repository("library/nginx")).unwrap();
        nav.push(&ScreenId::projects()).unwrap();
        assert_eq!(nav.stack().unwrap().ids(), &[ScreenId::projects()]);
        assert_eq!(nav.installed_count(), 3);
    }

    #[tokio::test]
    async fn test_load_and_activate_walks_down_to_artifacts() {
        let mut nav = browsing().await;
        nav.load(&ScreenId::projects()).await.unwrap();
        assert_eq!(nav.current().unwrap().options.len(), 2);

        let opened = nav.activate_selected().unwrap();
        assert_eq!(opened, Some(ScreenId::project("library")));
        nav.load(&ScreenId::project("library")).await.unwrap();

        let opened = nav.activate_selected().unwrap().unwrap();
        assert_eq!(opened, ScreenId::repository("library/nginx"));
        assert!(nav.needs_load(&opened));
        nav.load(&opened).await.unwrap();

        let screen = nav.current().unwrap();
        assert_eq!(screen.options.len(), 2);
        assert!(!screen.from_cache);
        // leaf rows open nothing
        assert_eq!(nav.activate_selected().unwrap(), None);
    }

    #[tokio::test]
    async fn test_select_wraps_on_current_screen() {
        let mut nav = browsing().await;
        nav.load(&ScreenId::projects()).await.unwrap();
        assert_eq!(nav.select_prev().unwrap().unwrap().label, "team");
        assert_eq!(nav.select_next().unwrap().unwrap().label, "library (2 repositories)");
        assert_eq!(nav.stack().unwrap().depth(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_keeps_previous_data() {
        let mut nav = browsing().await;
        let id = ScreenId::project("ghost");
        nav.push(&id).unwrap();
        let err = nav.load(&id).await.unwrap_err();
        assert!(matches!(err, HarborError::RemoteFetch { .. }));
        let screen = nav.current().unwrap();
        assert!(screen.data.is_none());
        assert!(screen.notice.as_deref().unwrap().contains("list_repositories"));
        assert!(!screen.loading);
    }

    #[tokio::test]
    async fn test_stale_generation_result_is_dropped() {
        let gateway = Arc::new(SnapshotGateway::new(snapshot()).with_latency(Duration::from_millis(20)));
        let mut nav = navigator_with(gateway.clone(), None);
        nav.login(credentials("secret")).await.unwrap();

        let root = ScreenId::projects();
        let stale = nav.begin_fetch(&root).unwrap();
        let fresh = nav.refresh(&root).unwrap();
        assert!(fresh.generation > stale.generation);

        let (stale, fresh) = tokio::join!(stale.run(), fresh.run());
        assert!(!nav.complete_fetch(stale).await.unwrap());
        assert!(nav.complete_fetch(fresh).await.unwrap());
        assert!(nav.current().unwrap().data.is_some());
    }

    #[tokio::test]
    async fn test_refresh_invalidates_cache_key() {
        let gateway = Arc::new(SnapshotGateway::new(snapshot()));
        let mut nav = navigator_with(gateway.clone(), None);
        nav.login(credentials("secret")).await.unwrap();
        let root = ScreenId::projects();

        nav.load(&root).await.unwrap();
        nav.load(&root).await.unwrap();
        assert!(nav.current().unwrap().from_cache);
        assert_eq!(gateway.calls(Operation::ListProjects), 1);

        let ticket = nav.refresh(&root).unwrap();
        let outcome = ticket.run().await;
        assert!(nav.complete_fetch(outcome).await.unwrap());
        assert!(!nav.current().unwrap().from_cache);
        assert_eq!(gateway.calls(Operation::ListProjects), 2);
    }

    #[tokio::test]
    async fn test_fetch_for_logged_out_screen_is_dropped() {
        let mut nav = browsing().await;
        let ticket = nav.begin_fetch(&ScreenId::projects()).unwrap();
        nav.logout();
        let outcome = ticket.run().await;
        assert!(!nav.complete_fetch(outcome).await.unwrap());
        assert_eq!(nav.installed_count(), 0);
        assert!(nav.gateway_name().is_none());
    }

    #[tokio::test]
    async fn test_filters_on_artifact_screen() {
        let mut nav = browsing().await;
        assert!(matches!(
            nav.set_filter("CVE", FilterValue::Text("x".into())).await,
            Err(HarborError::Navigation(_))
        ));

        let id = ScreenId::repository("library/nginx");
        nav.push(&id).unwrap();
        nav.load(&id).await.unwrap();
        nav.set_filter("Severity", FilterValue::selection(["High"])).await.unwrap();
        assert_eq!(nav.current().unwrap().options.len(), 1);

        let report = nav.report().unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(report.applied, vec!["Severity".to_string()]);

        nav.set_sort(SortOrder::Name).await.unwrap();
        nav.clear_filters(None).await.unwrap();
        let report = nav.report().unwrap();
        assert_eq!(report.count, 2);
        assert_eq!(report.artifacts.records()[0].digest, "sha256:bbbb");
    }

    #[tokio::test]
    async fn test_cache_is_reached_through_the_navigator() {
        let gateway = Arc::new(SnapshotGateway::new(snapshot()));
        let mut nav = navigator_with(gateway, None);
        assert!(nav.cached_keys().is_empty());
        assert!(nav.call_log().is_empty());
        assert!(matches!(nav.invalidate_cache(None), Err(HarborError::Navigation(_))));

        nav.login(credentials("secret")).await.unwrap();
        let root = ScreenId::projects();
        nav.load(&root).await.unwrap();
        let cached = nav.cached_keys();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].0, CacheKey::projects());
        assert!(cached[0].1.is_some());
        assert_eq!(nav.gateway_name(), Some("snapshot"));
        assert!(nav.call_log().iter().any(|l| l == "list_projects : miss"));
        assert_eq!(nav.last_call().unwrap().operation, Operation::ListProjects);

        nav.invalidate_cache(Some(Operation::ListProjects)).unwrap();
        assert!(nav.cached_keys().is_empty());
        assert!(nav.current().unwrap().data.is_some());
    }

    #[tokio::test]
    async fn test_report_is_stored_with_the_loaded_artifacts() {
        let mut nav = browsing().await;
        let id = ScreenId::repository("library/nginx");
        nav.push(&id).unwrap();
        assert!(matches!(nav.report(), Err(HarborError::Navigation(_))));

        let mut pipeline = crate::filters::default_pipeline();
        pipeline.set_value("Fixable", FilterValue::Switch(true)).unwrap();
        nav.set_pipeline(pipeline).await.unwrap();
        nav.load(&id).await.unwrap();

        let screen = nav.current().unwrap();
        let report = screen.report.as_ref().unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(screen.options.len(), report.count);
        assert_eq!(nav.report().unwrap().applied, vec!["Fixable".to_string()]);
    }
}
