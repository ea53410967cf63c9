use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info};

use crate::errors::HarborError;
use crate::gateway::{CallDiagnostics, Operation, RegistryGateway};
use crate::models::{ArtifactCollection, Project, Repository};
use super::diagnostics::{CallLog, CallStatus, LastCall};
use super::key::CacheKey;

type FetchResult<T> = Result<Arc<T>, Arc<HarborError>>;
type SharedFetch<T> = Shared<BoxFuture<'static, Settled<T>>>;

/// What every caller of one fetch receives: the result plus the last HTTP
/// exchange that fetch made.
struct Settled<T> {
    result: FetchResult<T>,
    diagnostics: Option<CallDiagnostics>,
}

impl<T> Clone for Settled<T> {
    fn clone(&self) -> Self {
        Self {
            result: self.result.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// A stored result. Entries never expire; they are only invalidated.
pub struct CacheEntry<T> {
    pub value: Arc<T>,
    pub fetched_at: DateTime<Utc>,
}

enum Slot<T> {
    Ready(CacheEntry<T>),
    /// A fetch is in flight. `ticket` identifies it so a completion can tell
    /// whether its slot was invalidated (and maybe refilled) in the meantime.
    Pending { ticket: u64, fetch: SharedFetch<T> },
}

/// A value returned by the facade.
#[derive(Debug)]
pub struct Fetched<T> {
    pub value: Arc<T>,
    pub from_cache: bool,
}

/// Any facade result, for callers that only hold a [`CacheKey`].
#[derive(Debug)]
pub enum CachedValue {
    Projects(Fetched<Vec<Project>>),
    Repositories(Fetched<Vec<Repository>>),
    Artifacts(Fetched<ArtifactCollection>),
}

impl CachedValue {
    pub fn from_cache(&self) -> bool {
        match self {
            CachedValue::Projects(f) => f.from_cache,
            CachedValue::Repositories(f) => f.from_cache,
            CachedValue::Artifacts(f) => f.from_cache,
        }
    }
}

/// Per-operation store. Locking is per DashMap shard, never held across an
/// await, so unrelated keys never wait on each other.
struct KeyedCache<T> {
    entries: Arc<DashMap<CacheKey, Slot<T>>>,
}

enum Lookup<T> {
    Hit(Arc<T>),
    Join(SharedFetch<T>),
    Lead(SharedFetch<T>),
}

impl<T: Send + Sync + 'static> KeyedCache<T> {
    fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    fn lookup<F>(&self, key: &CacheKey, ticket: u64, fetch: F) -> Lookup<T>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, HarborError>>,
    {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(occupied) => match occupied.get() {
                Slot::Ready(entry) => Lookup::Hit(Arc::clone(&entry.value)),
                Slot::Pending { fetch, .. } => Lookup::Join(fetch.clone()),
            },
            Entry::Vacant(vacant) => {
                let shared = self.settling_fetch(key.clone(), ticket, fetch());
                vacant.insert(Slot::Pending {
                    ticket,
                    fetch: shared.clone(),
                });
                Lookup::Lead(shared)
            }
        }
    }

    /// Wraps the gateway call so that whoever polls it to completion also
    /// writes the result back, but only into the slot it was started for.
    fn settling_fetch(
        &self,
        key: CacheKey,
        ticket: u64,
        fetch: BoxFuture<'static, Result<T, HarborError>>,
    ) -> SharedFetch<T> {
        let entries = Arc::clone(&self.entries);
        async move {
            let (result, diagnostics) = CallDiagnostics::capture(fetch).await;
            let result = result.map(Arc::new).map_err(Arc::new);
            settle(&entries, &key, ticket, &result);
            Settled { result, diagnostics }
        }
        .boxed()
        .shared()
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn remove(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    fn ready_keys(&self) -> Vec<CacheKey> {
        self.entries
            .iter()
            .filter(|e| matches!(e.value(), Slot::Ready(_)))
            .map(|e| e.key().clone())
            .collect()
    }

    fn fetched_at(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        self.entries.get(key).and_then(|slot| match slot.value() {
            Slot::Ready(entry) => Some(entry.fetched_at),
            Slot::Pending { .. } => None,
        })
    }
}

fn settle<T>(entries: &DashMap<CacheKey, Slot<T>>, key: &CacheKey, ticket: u64, result: &FetchResult<T>) {
    let Entry::Occupied(mut occupied) = entries.entry(key.clone()) else {
        debug!(key = %key, "Discarding fetch result for invalidated key");
        return;
    };
    let current = matches!(occupied.get(), Slot::Pending { ticket: t, .. } if *t == ticket);
    if !current {
        debug!(key = %key, "Discarding stale fetch result");
        return;
    }
    match result {
        Ok(value) => {
            occupied.insert(Slot::Ready(CacheEntry {
                value: Arc::clone(value),
                fetched_at: Utc::now(),
            }));
        }
        // No negative caching: the next call fetches again.
        Err(_) => {
            occupied.remove();
        }
    }
}

/// Memoizing front for a [`RegistryGateway`].
///
/// Results are keyed by [`CacheKey`]. Concurrent misses on one key share a
/// single gateway call. Fetches run on a spawned task, so a caller that
/// stops waiting does not cancel the request, and the result is still
/// stored unless the key was invalidated meanwhile. Must be used inside a
/// tokio runtime.
pub struct CachingFacade {
    gateway: Arc<dyn RegistryGateway>,
    projects: KeyedCache<Vec<Project>>,
    repositories: KeyedCache<Vec<Repository>>,
    artifacts: KeyedCache<ArtifactCollection>,
    next_ticket: AtomicU64,
    last_call: RwLock<Option<LastCall>>,
    call_log: CallLog,
}

impl CachingFacade {
    pub fn new(gateway: Arc<dyn RegistryGateway>, call_log_capacity: usize) -> Self {
        Self {
            gateway,
            projects: KeyedCache::new(),
            repositories: KeyedCache::new(),
            artifacts: KeyedCache::new(),
            next_ticket: AtomicU64::new(1),
            last_call: RwLock::new(None),
            call_log: CallLog::new(call_log_capacity),
        }
    }

    pub async fn list_projects(&self) -> Result<Fetched<Vec<Project>>, HarborError> {
        let gateway = Arc::clone(&self.gateway);
        self.call_keyed(&self.projects, CacheKey::projects(), move || {
            async move { gateway.list_projects().await }.boxed()
        })
        .await
    }

    pub async fn list_repositories(&self, project: &str) -> Result<Fetched<Vec<Repository>>, HarborError> {
        let key = CacheKey::repositories(project);
        key.validate()?;
        let gateway = Arc::clone(&self.gateway);
        let project = key.args[0].clone();
        self.call_keyed(&self.repositories, key, move || {
            async move { gateway.list_repositories(&project).await }.boxed()
        })
        .await
    }

    pub async fn list_artifacts(&self, repository: &str) -> Result<Fetched<ArtifactCollection>, HarborError> {
        let key = CacheKey::artifacts(repository);
        key.validate()?;
        let gateway = Arc::clone(&self.gateway);
        let repository = key.args[0].clone();
        self.call_keyed(&self.artifacts, key, move || {
            async move {
                let records = gateway.list_artifacts(&repository).await?;
                Ok(ArtifactCollection::new(records))
            }
            .boxed()
        })
        .await
    }

    /// Dispatches on the key's operation.
    pub async fn call(&self, key: &CacheKey) -> Result<CachedValue, HarborError> {
        key.validate()?;
        match key.operation {
            Operation::ListProjects => self.list_projects().await.map(CachedValue::Projects),
            Operation::ListRepositories => self
                .list_repositories(&key.args[0])
                .await
                .map(CachedValue::Repositories),
            Operation::ListArtifacts => self
                .list_artifacts(&key.args[0])
                .await
                .map(CachedValue::Artifacts),
        }
    }

    /// Clears every entry for `operation`, or everything when `None`.
    /// In-flight fetches for cleared keys still complete for their callers
    /// but are not stored.
    pub fn invalidate(&self, operation: Option<Operation>) {
        match operation {
            Some(Operation::ListProjects) => self.projects.clear(),
            Some(Operation::ListRepositories) => self.repositories.clear(),
            Some(Operation::ListArtifacts) => self.artifacts.clear(),
            None => {
                self.projects.clear();
                self.repositories.clear();
                self.artifacts.clear();
            }
        }
        info!(
            operation = operation.map_or("all", |op| op.as_str()),
            "Cache invalidated"
        );
    }

    /// Clears a single key. Returns whether anything was stored or in flight.
    pub fn invalidate_key(&self, key: &CacheKey) -> bool {
        let removed = match key.operation {
            Operation::ListProjects => self.projects.remove(key),
            Operation::ListRepositories => self.repositories.remove(key),
            Operation::ListArtifacts => self.artifacts.remove(key),
        };
        debug!(key = %key, removed, "Cache key invalidated");
        removed
    }

    /// Keys holding a stored value, sorted.
    pub fn cached_keys(&self) -> Vec<CacheKey> {
        let mut keys = self.projects.ready_keys();
        keys.extend(self.repositories.ready_keys());
        keys.extend(self.artifacts.ready_keys());
        keys.sort();
        keys
    }

    pub fn fetched_at(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        match key.operation {
            Operation::ListProjects => self.projects.fetched_at(key),
            Operation::ListRepositories => self.repositories.fetched_at(key),
            Operation::ListArtifacts => self.artifacts.fetched_at(key),
        }
    }

    pub fn last_call(&self) -> Option<LastCall> {
        self.last_call.read().ok().and_then(|last| last.clone())
    }

    pub fn call_log(&self) -> &CallLog {
        &self.call_log
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.gateway_name()
    }

    async fn call_keyed<T, F>(&self, cache: &KeyedCache<T>, key: CacheKey, fetch: F) -> Result<Fetched<T>, HarborError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> BoxFuture<'static, Result<T, HarborError>>,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (status, shared) = match cache.lookup(&key, ticket, fetch) {
            Lookup::Hit(value) => {
                self.record(&key, CallStatus::Hit);
                return Ok(Fetched { value, from_cache: true });
            }
            Lookup::Join(shared) => (CallStatus::Joined, shared),
            Lookup::Lead(shared) => {
                tokio::spawn(shared.clone());
                (CallStatus::Miss, shared)
            }
        };

        let settled = shared.await;
        match settled.result {
            Ok(value) => {
                if status == CallStatus::Miss {
                    if let Some(diag) = settled.diagnostics {
                        debug!(target: "harbortui::cache", "{}", diag);
                        self.call_log.push(diag.to_string());
                    }
                }
                self.record(&key, status);
                Ok(Fetched { value, from_cache: false })
            }
            Err(cause) => {
                self.record(&key, CallStatus::Failed(cause.to_string()));
                Err(HarborError::remote_fetch(key.operation.as_str(), key.args_summary(), cause))
            }
        }
    }

    fn record(&self, key: &CacheKey, status: CallStatus) {
        let call = LastCall {
            operation: key.operation,
            args: key.args_summary(),
            status,
            timestamp: Utc::now(),
        };
        let line = call.log_line();
        info!(target: "harbortui::cache", "{}", line);
        self.call_log.push(line);
        if let Ok(mut last) = self.last_call.write() {
            *last = Some(call);
        }
    }
}
