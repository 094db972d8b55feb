//! # Scrape Orchestrator
//!
//! Accepts search requests, fans each one out to one task per platform and
//! merges the outcomes into an atomically published `SearchResult`.
//!
//! Resources shared by every search:
//! - a global worker pool (`Semaphore`) bounding platform tasks in flight
//! - one rate limiter per platform
//! - the progress hub
//!
//! Each search owns a child cancellation token and a deadline. When either
//! fires, unfinished tasks are cancelled and aborted and the search is closed
//! with whatever was merged.
//!
//! Finished searches stay pollable until [`ScrapeOrchestrator::forget`] is
//! called or they are pushed out by newer ones beyond the retention cap.

use std::collections::{HashMap, VecDeque};
use std::pin::pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::progress::{ProgressHub, ProgressStream};
use super::rate_limiter::PlatformRateLimiters;
use super::retry::{RetryOutcome, RetryPolicy, run_with_retry};
use super::state::{PlatformOutcome, SearchHandle};
use crate::analysis::AnalysisEngine;
use crate::domain::{
    FetchError, HistoryStore, Platform, ProgressEvent, SearchId, SearchRequest, SearchResult, SearchStatus,
    SourceAdapter, ValidationError,
};
use crate::infrastructure::config::{AppConfig, defaults};

struct Shared {
    adapters: HashMap<Platform, Arc<dyn SourceAdapter>>,
    limiters: PlatformRateLimiters,
    retry: RetryPolicy,
    pool: Arc<Semaphore>,
    deadline: Duration,
    progress: ProgressHub,
    engine: AnalysisEngine,
    history: Option<Arc<dyn HistoryStore>>,
    searches: RwLock<HashMap<SearchId, Arc<SearchHandle>>>,
    /// Terminal searches, oldest first
    finished: Mutex<VecDeque<Arc<SearchHandle>>>,
    max_retained: usize,
    shutdown: CancellationToken,
}

impl Shared {
    /// Remove `handle` if it is still the one registered under its id
    fn evict(&self, handle: &Arc<SearchHandle>) -> bool {
        let id = handle.request.id;
        let mut searches = self.searches.write().unwrap_or_else(PoisonError::into_inner);
        if !searches.get(&id).is_some_and(|current| Arc::ptr_eq(current, handle)) {
            return false;
        }
        searches.remove(&id);
        self.progress.remove(id);
        true
    }

    fn handle_is_current(&self, handle: &Arc<SearchHandle>) -> bool {
        self.searches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle.request.id)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
    }

    /// Queue a finished search and drop whatever exceeds the retention cap
    fn retire(&self, handle: Arc<SearchHandle>) {
        let evicted: Vec<Arc<SearchHandle>> = {
            let mut finished = self.finished.lock().unwrap_or_else(PoisonError::into_inner);
            finished.push_back(handle);
            let excess = finished.len().saturating_sub(self.max_retained);
            finished.drain(..excess).collect()
        };
        for old in evicted {
            if self.evict(&old) {
                debug!("Evicted finished search {}", old.request.id);
            }
        }
    }
}

/// Cheap to clone; clones share every search and resource
#[derive(Clone)]
pub struct ScrapeOrchestrator {
    shared: Arc<Shared>,
}

pub struct OrchestratorBuilder {
    adapters: HashMap<Platform, Arc<dyn SourceAdapter>>,
    limiters: PlatformRateLimiters,
    retry: RetryPolicy,
    worker_pool_size: usize,
    deadline: Duration,
    progress_buffer: usize,
    max_retained: usize,
    history: Option<Arc<dyn HistoryStore>>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl OrchestratorBuilder {
    /// Pool size, deadline, retry and rate limits taken from `config`
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            adapters: HashMap::new(),
            limiters: PlatformRateLimiters::new(&config.rate_limit),
            retry: RetryPolicy::from(&config.retry),
            worker_pool_size: config.orchestrator.worker_pool_size,
            deadline: config.orchestrator.search_deadline(),
            progress_buffer: config.orchestrator.progress_buffer,
            max_retained: config.orchestrator.max_retained_searches,
            history: None,
        }
    }

    /// Registers `adapter` for its platform, replacing any previous one
    #[must_use]
    pub fn adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(adapter.platform(), adapter);
        self
    }

    #[must_use]
    pub fn adapters(self, adapters: impl IntoIterator<Item = Arc<dyn SourceAdapter>>) -> Self {
        adapters.into_iter().fold(self, Self::adapter)
    }

    #[must_use]
    pub fn rate_limiters(mut self, limiters: PlatformRateLimiters) -> Self {
        self.limiters = limiters;
        self
    }

    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    #[must_use]
    pub fn search_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn progress_buffer(mut self, capacity: usize) -> Self {
        self.progress_buffer = capacity;
        self
    }

    /// Finished searches kept for `poll` and `subscribe`
    #[must_use]
    pub fn max_retained_searches(mut self, count: usize) -> Self {
        self.max_retained = count;
        self
    }

    #[must_use]
    pub fn history_store(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn build(self) -> ScrapeOrchestrator {
        let pool_size = if self.worker_pool_size == 0 {
            defaults::WORKER_POOL_SIZE
        } else {
            self.worker_pool_size
        };
        info!(
            "Orchestrator ready: {} adapters, pool {}, deadline {:?}",
            self.adapters.len(),
            pool_size,
            self.deadline
        );
        ScrapeOrchestrator {
            shared: Arc::new(Shared {
                adapters: self.adapters,
                limiters: self.limiters,
                retry: self.retry,
                pool: Arc::new(Semaphore::new(pool_size)),
                deadline: self.deadline,
                progress: ProgressHub::new(self.progress_buffer),
                engine: AnalysisEngine::new(),
                history: self.history,
                searches: RwLock::new(HashMap::new()),
                finished: Mutex::new(VecDeque::new()),
                max_retained: self.max_retained.max(1),
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

impl ScrapeOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<_> = self.shared.adapters.keys().copied().collect();
        platforms.sort();
        platforms
    }

    fn handle(&self, id: SearchId) -> Option<Arc<SearchHandle>> {
        self.shared
            .searches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Validate `request` and launch it in the background.
    ///
    /// An id that is still known to the orchestrator, running or retained,
    /// is rejected. Must be called from within a tokio runtime.
    pub async fn start(&self, request: SearchRequest) -> Result<SearchId, ValidationError> {
        request.validate()?;
        if let Some(missing) = request.platforms.iter().find(|p| !self.shared.adapters.contains_key(*p)) {
            return Err(ValidationError::PlatformUnavailable(*missing));
        }

        let id = request.id;
        let handle = {
            let mut searches = self.shared.searches.write().unwrap_or_else(PoisonError::into_inner);
            if searches.contains_key(&id) {
                warn!("Rejecting duplicate search {}", id);
                return Err(ValidationError::DuplicateSearch(id));
            }
            let handle = Arc::new(SearchHandle::new(request, self.shared.shutdown.child_token()));
            self.shared.progress.register(id);
            searches.insert(id, Arc::clone(&handle));
            handle
        };

        if let Some(history) = &self.shared.history {
            if let Err(e) = history.create(&handle.request).await {
                warn!("History store rejected search {}: {}", id, e);
            }
        }

        info!(
            "🔍 Search {} started: '{}' on [{}]",
            id,
            handle.request.keyword,
            handle.request.platforms.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", ")
        );
        self.shared
            .progress
            .publish(ProgressEvent::new(id, SearchStatus::Pending, 0, "Search started", 0));

        tokio::spawn(run_search(Arc::clone(&self.shared), handle));
        Ok(id)
    }

    /// Current snapshot. Polls after completion return the same `Arc`.
    pub fn poll(&self, id: SearchId) -> Option<Arc<SearchResult>> {
        self.handle(id).map(|h| h.snapshot())
    }

    /// `true` if the search was pending and is now cancelled
    pub fn cancel(&self, id: SearchId) -> bool {
        let Some(handle) = self.handle(id) else {
            return false;
        };
        match handle.cancel() {
            Some(event) => {
                info!("🛑 Search {} cancelled", id);
                self.shared.progress.publish(event);
                true
            }
            None => false,
        }
    }

    pub fn subscribe(&self, id: SearchId) -> Option<ProgressStream> {
        self.shared.progress.subscribe(id)
    }

    /// Drop a finished search and its progress channel.
    ///
    /// `false` for unknown ids and for searches still running.
    pub fn forget(&self, id: SearchId) -> bool {
        let Some(handle) = self.handle(id).filter(|h| h.is_terminal()) else {
            return false;
        };
        self.shared
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|finished| !Arc::ptr_eq(finished, &handle));
        let forgotten = self.shared.evict(&handle);
        if forgotten {
            debug!("Search {} forgotten", id);
        }
        forgotten
    }

    /// Resolves with the terminal snapshot
    pub async fn wait(&self, id: SearchId) -> Option<Arc<SearchResult>> {
        let mut receiver = self.handle(id)?.watch();
        let snapshot = receiver.wait_for(|result| result.is_terminal()).await.ok()?;
        Some(Arc::clone(&snapshot))
    }

    pub fn active_searches(&self) -> usize {
        self.shared
            .searches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|h| !h.is_terminal())
            .count()
    }

    /// Cancel every pending search
    pub fn shutdown(&self) {
        let handles: Vec<_> = self
            .shared
            .searches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for handle in handles {
            if let Some(event) = handle.cancel() {
                self.shared.progress.publish(event);
            }
        }
        self.shared.shutdown.cancel();
    }
}

/// Drive one search from fan-out to its terminal state
async fn run_search(shared: Arc<Shared>, handle: Arc<SearchHandle>) {
    let id = handle.request.id;
    let started = Instant::now();
    let limit = handle.request.limit as usize;
    let keyword: Arc<str> = Arc::from(handle.request.keyword.as_str());

    let mut tasks = FuturesUnordered::new();
    let mut aborts: Vec<AbortHandle> = Vec::with_capacity(handle.request.platforms.len());
    for &platform in &handle.request.platforms {
        let Some(adapter) = shared.adapters.get(&platform).cloned() else {
            continue;
        };
        let task = tokio::spawn(run_platform(
            Arc::clone(&shared),
            adapter,
            Arc::clone(&keyword),
            limit,
            handle.cancel.clone(),
        ));
        aborts.push(task.abort_handle());
        tasks.push(task.map(move |joined| (platform, joined)));
    }

    let mut deadline = pin!(tokio::time::sleep(shared.deadline));
    let mut deadline_hit = false;
    loop {
        tokio::select! {
            biased;
            () = handle.cancel.cancelled() => break,
            () = &mut deadline => {
                deadline_hit = true;
                warn!("⏰ Search {} hit its deadline after {:?}", id, shared.deadline);
                break;
            }
            next = tasks.next() => {
                let Some((platform, joined)) = next else { break };
                let outcome = joined.unwrap_or_else(|e| {
                    error!("[{}] platform task failed: {}", platform, e);
                    PlatformOutcome::Failed(FetchError::network(format!("platform task failed: {e}")))
                });
                if let Some(event) = handle.merge(platform, outcome) {
                    debug!("Search {} progress {}%: {}", id, event.progress, event.message);
                    shared.progress.publish(event);
                }
            }
        }
    }

    handle.cancel.cancel();
    for abort in &aborts {
        abort.abort();
    }

    if let Some(event) = handle.finalize(&shared.engine, deadline_hit) {
        match event.status {
            SearchStatus::Completed => info!(
                "✅ Search {} completed in {:?}: {} products",
                id,
                started.elapsed(),
                event.current_count
            ),
            _ => error!("❌ Search {} failed in {:?}: {}", id, started.elapsed(), event.message),
        }
        shared.progress.publish(event);
    }

    if let Some(history) = &shared.history {
        let snapshot = handle.snapshot();
        if let Err(e) = history.record(&snapshot).await {
            warn!("Failed to record search {} in history: {}", id, e);
        }
    }

    if shared.handle_is_current(&handle) {
        shared.retire(handle);
    }
}

/// One platform's fetch: worker slot, then rate-limited attempts with retry
async fn run_platform(
    shared: Arc<Shared>,
    adapter: Arc<dyn SourceAdapter>,
    keyword: Arc<str>,
    limit: usize,
    cancel: CancellationToken,
) -> PlatformOutcome {
    let platform = adapter.platform();
    let _permit = tokio::select! {
        () = cancel.cancelled() => return PlatformOutcome::Cancelled,
        permit = Arc::clone(&shared.pool).acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return PlatformOutcome::Cancelled,
        },
    };

    let limiters = &shared.limiters;
    let adapter = &adapter;
    let keyword = &*keyword;
    let cancel = &cancel;
    let outcome = run_with_retry(&shared.retry, platform, cancel, move |_attempt| async move {
        if !limiters.acquire(platform, cancel).await {
            return Err(FetchError::network("cancelled while waiting for rate limit"));
        }
        tokio::select! {
            () = cancel.cancelled() => Err(FetchError::network("cancelled during fetch")),
            fetched = adapter.fetch(keyword, limit, cancel) => fetched,
        }
    })
    .await;

    match outcome {
        RetryOutcome::Success { mut value, attempts } => {
            value.truncate(limit);
            info!("[{}] fetched {} products ({} attempt(s))", platform, value.len(), attempts);
            PlatformOutcome::Fetched(value)
        }
        RetryOutcome::Exhausted { error, attempts } => {
            warn!("[{}] failed after {} attempt(s): {}", platform, attempts, error);
            PlatformOutcome::Failed(error)
        }
        RetryOutcome::Cancelled { attempts } => {
            debug!("[{}] cancelled after {} attempt(s)", platform, attempts);
            PlatformOutcome::Cancelled
        }
    }
}
