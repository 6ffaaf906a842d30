//! Multi-project metadata cache.
//!
//! Holds project info and category listings for every credentialed project.
//! Reads are served from memory; a miss performs one on-demand fetch guarded by
//! [`FailureBackoff`]. Full refreshes run in the background, tolerate
//! per-project failures, and persist project info through
//! [`PersistentCacheStore`].

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use backoff::ExponentialBackoffBuilder;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{
    backoff::FailureBackoff,
    metrics::{CacheMetrics, CacheMetricsSnapshot},
    status::{CacheState, InitOutcome, RefreshOutcome, RefreshReport, RefreshStatus},
};
use crate::{
    backend::{
        Backend, CategoryInfo, InterfaceDetail, InterfaceSummary, ProjectInfo,
        SaveInterfaceParams, SearchCriteria, SearchResult,
    },
    config::CacheConfig,
    credentials::CredentialTable,
    error::{BackendError, BackendResult},
    store::{now_millis, PersistentCacheStore},
};

const RETRY_INITIAL_INTERVAL: Duration = Duration::from_millis(200);
const RETRY_MAX_INTERVAL: Duration = Duration::from_secs(5);

pub struct ProjectMetadataCache {
    credentials: Arc<CredentialTable>,
    backend: Arc<dyn Backend>,
    store: PersistentCacheStore,
    config: CacheConfig,

    projects: RwLock<HashMap<String, ProjectInfo>>,
    categories: RwLock<HashMap<String, Vec<CategoryInfo>>>,

    refreshing: AtomicBool,
    status_tx: watch::Sender<RefreshStatus>,
    backoff: FailureBackoff,
    metrics: CacheMetrics,
}

/// Search result together with the projects the keyword resolved to.
#[derive(Debug, Clone)]
pub struct ScopedSearch {
    pub project_ids: Vec<String>,
    pub result: SearchResult,
}

fn project_key(project_id: &str) -> String {
    format!("project:{}", project_id)
}

fn categories_key(project_id: &str) -> String {
    format!("categories:{}", project_id)
}

impl ProjectMetadataCache {
    pub fn new(
        credentials: Arc<CredentialTable>,
        backend: Arc<dyn Backend>,
        config: CacheConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(RefreshStatus::cold());
        Self {
            store: PersistentCacheStore::new(config.snapshot_path()),
            backoff: FailureBackoff::new(config.backoff_base(), config.backoff_max()),
            credentials,
            backend,
            config,
            projects: RwLock::new(HashMap::new()),
            categories: RwLock::new(HashMap::new()),
            refreshing: AtomicBool::new(false),
            status_tx,
            metrics: CacheMetrics::new(),
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialTable> {
        &self.credentials
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &PersistentCacheStore {
        &self.store
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load the snapshot if it is fresh, otherwise schedule a background
    /// refresh. Never waits on the network.
    pub fn initialize(self: &Arc<Self>) -> InitOutcome {
        let ttl = self.config.ttl_minutes;
        let snapshot = match self.store.load_checked() {
            Ok(Some(snapshot)) if !snapshot.is_expired(ttl) => snapshot,
            Ok(Some(snapshot)) => {
                info!(
                    created_at = snapshot.created_at,
                    ttl_minutes = ttl,
                    "Cache snapshot expired, refreshing in background"
                );
                return self.schedule_initial_refresh();
            }
            Ok(None) => {
                info!("No cache snapshot, refreshing in background");
                return self.schedule_initial_refresh();
            }
            Err(e) => {
                warn!(
                    path = %self.store.path().display(),
                    "Unusable cache snapshot, refreshing in background: {}", e
                );
                return self.schedule_initial_refresh();
            }
        };

        // Drop entries for projects that are no longer configured
        let projects: HashMap<String, ProjectInfo> = snapshot
            .project_info_by_id
            .into_iter()
            .filter(|(id, _)| self.credentials.contains(id))
            .collect();

        if projects.is_empty() {
            info!("Cache snapshot has no configured projects, refreshing in background");
            return self.schedule_initial_refresh();
        }

        info!(projects = projects.len(), "Loaded project metadata from snapshot");
        *self.projects.write() = projects;
        self.status_tx.send_modify(|status| {
            if status.state == CacheState::Cold {
                status.state = CacheState::Warm;
            }
        });
        InitOutcome::WarmStart
    }

    fn schedule_initial_refresh(self: &Arc<Self>) -> InitOutcome {
        self.trigger_refresh();
        InitOutcome::RefreshScheduled
    }

    /// Spawn a full refresh. Returns `false` if one is already in flight.
    pub fn trigger_refresh(self: &Arc<Self>) -> bool {
        if !self.try_begin_refresh() {
            debug!("Refresh already in flight, not scheduling another");
            self.metrics.record_refresh_outcome(&RefreshOutcome::Skipped);
            return false;
        }

        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = cache.run_refresh().await;
            debug!(outcome = outcome.label(), "Background refresh finished");
        });
        true
    }

    /// Refresh every configured project. Returns `Skipped` immediately when
    /// another refresh is running.
    pub async fn refresh_all(&self) -> RefreshOutcome {
        if !self.try_begin_refresh() {
            debug!("Refresh already in flight, skipping");
            let outcome = RefreshOutcome::Skipped;
            self.metrics.record_refresh_outcome(&outcome);
            return outcome;
        }
        self.run_refresh().await
    }

    /// Wait until no refresh is in flight and return the settled status.
    pub async fn wait_for_idle(&self) -> RefreshStatus {
        let mut rx = self.status_tx.subscribe();
        let result = rx.wait_for(|status| !status.is_refreshing()).await;
        match result {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        }
    }

    pub fn status(&self) -> RefreshStatus {
        self.status_tx.borrow().clone()
    }

    pub fn state(&self) -> CacheState {
        self.status_tx.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshStatus> {
        self.status_tx.subscribe()
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Remove the snapshot and empty both maps. Returns `false` when the
    /// snapshot file could not be removed; memory is cleared either way.
    pub fn clear_cache(&self) -> bool {
        let removed = match self.store.clear() {
            Ok(()) => true,
            Err(e) => {
                error!(path = %self.store.path().display(), "Failed to remove cache snapshot: {}", e);
                false
            }
        };

        self.projects.write().clear();
        self.categories.write().clear();
        self.backoff.clear();
        self.status_tx.send_modify(|status| {
            if status.state != CacheState::Refreshing {
                status.state = CacheState::Cold;
            }
        });

        info!("Cleared project metadata cache");
        removed
    }

    // ========================================================================
    // Refresh internals
    // ========================================================================

    fn try_begin_refresh(&self) -> bool {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.status_tx
            .send_modify(|status| status.state = CacheState::Refreshing);
        true
    }

    // Publishing the settled state and releasing the flag happen under the
    // watch lock, so a waiter that sees an idle status can start a new refresh.
    fn finish_refresh(&self, outcome: Option<&RefreshOutcome>) {
        let settled = self.settled_state();
        self.status_tx.send_modify(|status| {
            status.state = settled;
            if let Some(outcome) = outcome {
                status.generation += 1;
                status.last_outcome = Some(outcome.clone());
                status.last_refreshed_at = Some(now_millis());
            }
            self.refreshing.store(false, Ordering::Release);
        });
    }

    fn settled_state(&self) -> CacheState {
        if self.projects.read().is_empty() {
            CacheState::Cold
        } else {
            CacheState::Warm
        }
    }

    /// Body of a refresh; the caller must hold the refresh flag.
    async fn run_refresh(&self) -> RefreshOutcome {
        // Releases the flag if this future is dropped mid-flight
        let guard = scopeguard::guard((), |()| self.finish_refresh(None));
        self.metrics.record_refresh_started();

        let ids: Vec<String> = self.credentials.project_ids().map(str::to_string).collect();
        info!(projects = ids.len(), "Refreshing project metadata");

        let results = join_all(ids.iter().map(|id| self.fetch_project_with_retry(id))).await;

        let mut report = RefreshReport::default();
        let mut fetched = HashMap::with_capacity(ids.len());
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(info) => {
                    report.succeeded.push(id.clone());
                    fetched.insert(id.clone(), info);
                }
                Err(e) => {
                    warn!(project_id = %id, "Project info refresh failed: {}", e);
                    report.failed.push((id.clone(), e.to_string()));
                }
            }
        }

        if ids.is_empty() {
            warn!("No configured projects, keeping previous cache");
        } else if fetched.is_empty() {
            error!(
                failed = report.failed.len(),
                "Refresh failed for every project, keeping previous cache"
            );
        } else {
            self.apply_refresh(fetched, &mut report).await;
        }

        let outcome = RefreshOutcome::from_report(report);
        self.metrics.record_refresh_outcome(&outcome);
        if let Some(report) = outcome.report() {
            info!(
                outcome = outcome.label(),
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                categories_failed = report.categories_failed.len(),
                persisted = report.persisted,
                "Refresh finished"
            );
        }

        scopeguard::ScopeGuard::into_inner(guard);
        self.finish_refresh(Some(&outcome));
        outcome
    }

    async fn apply_refresh(
        &self,
        fetched: HashMap<String, ProjectInfo>,
        report: &mut RefreshReport,
    ) {
        // Failed projects keep whatever the previous cycle had
        let merged = {
            let previous = self.projects.read();
            let mut merged = fetched;
            for (id, _) in &report.failed {
                if let Some(info) = previous.get(id) {
                    merged.insert(id.clone(), info.clone());
                }
            }
            merged
        };

        match self.store.save(&merged) {
            Ok(()) => report.persisted = true,
            Err(e) => warn!(
                path = %self.store.path().display(),
                "Failed to persist cache snapshot: {}", e
            ),
        }

        let known: Vec<String> = self
            .credentials
            .project_ids()
            .filter(|id| merged.contains_key(*id))
            .map(str::to_string)
            .collect();
        *self.projects.write() = merged;
        for id in &report.succeeded {
            self.backoff.record_success(&project_key(id));
        }

        let results = join_all(known.iter().map(|id| self.backend.get_category_list(id))).await;
        let mut categories = HashMap::with_capacity(known.len());
        for (id, result) in known.into_iter().zip(results) {
            match result {
                Ok(list) => {
                    self.backoff.record_success(&categories_key(&id));
                    categories.insert(id, list);
                }
                Err(e) => {
                    warn!(project_id = %id, "Category refresh failed: {}", e);
                    report.categories_failed.push(id);
                }
            }
        }
        *self.categories.write() = categories;
    }

    async fn fetch_project_with_retry(&self, project_id: &str) -> BackendResult<ProjectInfo> {
        let max_elapsed = self.config.refresh_retry_max_elapsed();
        if max_elapsed.is_zero() {
            return self.backend.get_project_info(project_id).await;
        }

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(RETRY_INITIAL_INTERVAL)
            .with_max_interval(RETRY_MAX_INTERVAL)
            .with_max_elapsed_time(Some(max_elapsed))
            .build();

        backoff::future::retry(policy, || async {
            match self.backend.get_project_info(project_id).await {
                Ok(info) => Ok(info),
                Err(e) if e.is_transient() => {
                    debug!(project_id = %project_id, "Transient refresh failure, retrying: {}", e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Cached projects in configuration order.
    pub fn list_projects(&self) -> Vec<ProjectInfo> {
        let projects = self.projects.read();
        self.credentials
            .project_ids()
            .filter_map(|id| projects.get(id).cloned())
            .collect()
    }

    /// `None` for projects without a credential.
    pub async fn get_project_info(&self, project_id: &str) -> BackendResult<Option<ProjectInfo>> {
        if !self.credentials.contains(project_id) {
            return Ok(None);
        }
        if let Some(info) = self.projects.read().get(project_id).cloned() {
            return Ok(Some(info));
        }

        let info = self
            .fetch_on_demand(&project_key(project_id), || {
                self.backend.get_project_info(project_id)
            })
            .await?;
        self.projects
            .write()
            .insert(project_id.to_string(), info.clone());
        Ok(Some(info))
    }

    /// `None` for projects without a credential.
    pub async fn get_categories(
        &self,
        project_id: &str,
    ) -> BackendResult<Option<Vec<CategoryInfo>>> {
        if !self.credentials.contains(project_id) {
            return Ok(None);
        }
        if let Some(list) = self.categories.read().get(project_id).cloned() {
            return Ok(Some(list));
        }

        let list = self
            .fetch_on_demand(&categories_key(project_id), || {
                self.backend.get_category_list(project_id)
            })
            .await?;
        self.categories
            .write()
            .insert(project_id.to_string(), list.clone());
        Ok(Some(list))
    }

    /// Interface listings are not cached. `None` for projects without a
    /// credential.
    pub async fn get_category_interfaces(
        &self,
        project_id: &str,
        category_id: &str,
    ) -> BackendResult<Option<Vec<InterfaceSummary>>> {
        if !self.credentials.contains(project_id) {
            return Ok(None);
        }
        self.backend
            .get_category_interfaces(project_id, category_id)
            .await
            .map(Some)
    }

    /// Backoff is tracked per cached entity, see [`project_key`] and
    /// [`categories_key`].
    async fn fetch_on_demand<T, F, Fut>(&self, key: &str, fetch: F) -> BackendResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        if let Some(retry_after) = self.backoff.check(key) {
            self.metrics.record_backoff_rejection();
            debug!(key = %key, ?retry_after, "On-demand fetch refused while backing off");
            return Err(BackendError::BackingOff {
                key: key.to_string(),
                retry_after,
            });
        }

        self.metrics.record_on_demand_fetch();
        match fetch().await {
            Ok(value) => {
                self.backoff.record_success(key);
                Ok(value)
            }
            Err(e) => {
                self.metrics.record_on_demand_failure();
                let delay = self.backoff.record_failure(key);
                warn!(
                    key = %key,
                    ?delay,
                    "On-demand fetch failed: {}", e
                );
                Err(e)
            }
        }
    }

    // ========================================================================
    // Pass-through
    // ========================================================================

    pub async fn get_interface(
        &self,
        project_id: &str,
        interface_id: &str,
    ) -> BackendResult<InterfaceDetail> {
        self.backend.get_interface(project_id, interface_id).await
    }

    pub async fn save_interface(&self, params: &SaveInterfaceParams) -> BackendResult<String> {
        params.validate().map_err(BackendError::InvalidRequest)?;
        let id = self.backend.save_interface(params).await?;
        info!(
            project_id = %params.project_id,
            interface_id = %id,
            update = params.is_update(),
            "Saved interface"
        );
        Ok(id)
    }

    /// Search interfaces in the projects matching `project_keyword`, or in
    /// every configured project when it is absent. `criteria.project_ids` is
    /// overwritten.
    pub async fn search_interfaces(
        &self,
        project_keyword: Option<&str>,
        mut criteria: SearchCriteria,
    ) -> BackendResult<ScopedSearch> {
        criteria.project_ids = self.resolve_projects(project_keyword)?;
        debug!(projects = ?criteria.project_ids, "Searching interfaces");
        let result = self.backend.search_interfaces(&criteria).await?;
        Ok(ScopedSearch {
            project_ids: criteria.project_ids,
            result,
        })
    }

    /// A keyword matches a configured project id exactly or a cached project
    /// name case-insensitively.
    pub fn resolve_projects(&self, project_keyword: Option<&str>) -> BackendResult<Vec<String>> {
        let keyword = match project_keyword.map(str::trim) {
            None | Some("") => {
                return Ok(self.credentials.project_ids().map(str::to_string).collect());
            }
            Some(k) => k.to_lowercase(),
        };

        let projects = self.projects.read();
        let matched: Vec<String> = self
            .credentials
            .project_ids()
            .filter(|id| {
                id.eq_ignore_ascii_case(&keyword)
                    || projects
                        .get(*id)
                        .is_some_and(|p| p.name.to_lowercase().contains(&keyword))
            })
            .map(str::to_string)
            .collect();

        if matched.is_empty() {
            return Err(BackendError::NotFound(format!(
                "no configured project matches '{}'",
                keyword
            )));
        }
        Ok(matched)
    }
}
