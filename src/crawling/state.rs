//! Per-search mutable state
//!
//! All mutations of one search go through a single lock, and every mutation
//! publishes a fresh `Arc<SearchResult>` through a watch channel. Readers only
//! ever clone the `Arc`, so a poll never sees a half-applied merge.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::analysis::AnalysisEngine;
use crate::domain::{
    FetchError, OrchestrationError, Platform, PlatformError, Product, ProgressEvent, SearchRequest, SearchResult,
    SearchStatus,
};

/// What a platform task hands back to the search
#[derive(Debug)]
pub enum PlatformOutcome {
    Fetched(Vec<Product>),
    Failed(FetchError),
    Cancelled,
}

struct Inner {
    result: SearchResult,
    finished: BTreeSet<Platform>,
    succeeded: usize,
}

pub struct SearchHandle {
    pub request: SearchRequest,
    pub cancel: CancellationToken,
    inner: Mutex<Inner>,
    snapshot: watch::Sender<Arc<SearchResult>>,
}

impl SearchHandle {
    pub fn new(request: SearchRequest, cancel: CancellationToken) -> Self {
        let result = SearchResult::pending(&request);
        let (snapshot, _) = watch::channel(Arc::new(result.clone()));
        Self {
            request,
            cancel,
            inner: Mutex::new(Inner {
                result,
                finished: BTreeSet::new(),
                succeeded: 0,
            }),
            snapshot,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, result: &SearchResult) {
        self.snapshot.send_replace(Arc::new(result.clone()));
    }

    pub fn snapshot(&self) -> Arc<SearchResult> {
        Arc::clone(&self.snapshot.borrow())
    }

    pub fn watch(&self) -> watch::Receiver<Arc<SearchResult>> {
        self.snapshot.subscribe()
    }

    pub fn is_terminal(&self) -> bool {
        self.lock().result.is_terminal()
    }

    fn event(&self, result: &SearchResult, message: String) -> ProgressEvent {
        ProgressEvent::new(
            self.request.id,
            result.status,
            result.progress,
            message,
            result.total_products(),
        )
    }

    /// Merge one platform's outcome. `None` if the search already ended.
    pub fn merge(&self, platform: Platform, outcome: PlatformOutcome) -> Option<ProgressEvent> {
        let mut inner = self.lock();
        if inner.result.is_terminal() || !inner.finished.insert(platform) {
            return None;
        }

        let message = match outcome {
            PlatformOutcome::Fetched(products) => {
                inner.succeeded += 1;
                let message = format!("{}: {} products", platform.display_name(), products.len());
                inner.result.results.insert(platform, products);
                message
            }
            PlatformOutcome::Failed(error) => {
                let message = format!("{}: {}", platform.display_name(), error);
                inner.result.platform_errors.insert(platform, PlatformError::from(error));
                message
            }
            PlatformOutcome::Cancelled => format!("{}: cancelled", platform.display_name()),
        };

        let requested = self.request.platforms.len().max(1);
        let progress = ((100.0 * inner.finished.len() as f64) / requested as f64).round() as u8;
        inner.result.progress = inner.result.progress.max(progress.min(100));

        self.publish(&inner.result);
        Some(self.event(&inner.result, message).for_platform(platform))
    }

    /// Close the search after every task returned or the deadline hit.
    ///
    /// Platforms that never reported are recorded as timed out.
    pub fn finalize(&self, engine: &AnalysisEngine, deadline_hit: bool) -> Option<ProgressEvent> {
        let mut inner = self.lock();
        if inner.result.is_terminal() {
            return None;
        }

        let unfinished: Vec<Platform> = self
            .request
            .platforms
            .iter()
            .copied()
            .filter(|p| !inner.finished.contains(p))
            .collect();
        for platform in unfinished {
            inner.finished.insert(platform);
            inner.result.results.insert(platform, Vec::new());
            inner
                .result
                .platform_errors
                .insert(platform, FetchError::timeout("search deadline exceeded").into());
        }

        let failures = failure_summary(&inner.result);
        let succeeded = inner.succeeded;
        let result = &mut inner.result;
        if succeeded > 0 {
            result.status = SearchStatus::Completed;
            result.progress = 100;
            result.analysis = Some(engine.analyze(&result.results, &self.request.filters));
            result.error = failures;
        } else {
            let reason = if deadline_hit {
                OrchestrationError::DeadlineExceeded
            } else {
                OrchestrationError::AllPlatformsFailed
            };
            result.status = SearchStatus::Failed;
            result.error = Some(match failures {
                Some(details) => format!("{reason}: {details}"),
                None => reason.to_string(),
            });
        }
        result.finished_at = Some(Utc::now());

        let message = match result.status {
            SearchStatus::Completed => format!("Search completed with {} products", result.total_products()),
            _ => format!("Search failed: {}", result.error.as_deref().unwrap_or_default()),
        };
        let result = result.clone();
        drop(inner);
        self.publish(&result);
        Some(self.event(&result, message))
    }

    /// Mark the search cancelled, keeping what was merged so far
    pub fn cancel(&self) -> Option<ProgressEvent> {
        let mut inner = self.lock();
        if inner.result.is_terminal() {
            return None;
        }
        self.cancel.cancel();

        let result = &mut inner.result;
        result.status = SearchStatus::Failed;
        result.error = Some(OrchestrationError::Cancelled.to_string());
        result.finished_at = Some(Utc::now());
        let result = result.clone();
        drop(inner);

        self.publish(&result);
        Some(self.event(&result, "Search cancelled".to_string()))
    }
}

/// `platform=kind (detail)` for every failed platform, in platform order
fn failure_summary(result: &SearchResult) -> Option<String> {
    if result.platform_errors.is_empty() {
        return None;
    }
    let parts: Vec<String> = result
        .platform_errors
        .iter()
        .map(|(platform, error)| format!("{}={} ({})", platform, error.kind, error.detail))
        .collect();
    Some(parts.join("; "))
}
