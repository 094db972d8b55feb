//! Domain service contracts
//!
//! The orchestrator depends only on these traits. Concrete adapters, the
//! history store and exporters live in `infrastructure`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::errors::FetchError;
use super::product::{Platform, Product};
use super::search::{SearchId, SearchRequest, SearchResult};

/// Per-marketplace product search.
///
/// Implementations keep no state between calls beyond their network
/// configuration. Returning fewer than `limit` products is a valid partial
/// result; `Ok(vec![])` means the marketplace had no matches.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetch up to `limit` products for `keyword`, in the marketplace's own
    /// ranking order. `cancel` should be checked between network round trips.
    async fn fetch(&self, keyword: &str, limit: usize, cancel: &CancellationToken) -> Result<Vec<Product>, FetchError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("search {0} not found")]
    NotFound(SearchId),

    #[error("search {0} already exists")]
    Duplicate(SearchId),
}

/// Stored entry: the request plus the latest recorded result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub request: SearchRequest,
    pub result: Option<SearchResult>,
}

/// Key-value history collaborator
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn create(&self, request: &SearchRequest) -> Result<(), HistoryError>;

    /// Store the terminal result of a search created earlier
    async fn record(&self, result: &SearchResult) -> Result<(), HistoryError>;

    async fn get(&self, id: SearchId) -> Option<HistoryEntry>;

    /// Newest first
    async fn list(&self, limit: usize) -> Vec<HistoryEntry>;

    async fn delete(&self, id: SearchId) -> Result<(), HistoryError>;

    async fn clear(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Spreadsheet,
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("export format {0:?} is not supported by this renderer")]
    UnsupportedFormat(ExportFormat),

    #[error("failed to encode search result: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Renders a finished search for download
pub trait ExportRenderer: Send + Sync {
    fn render(&self, result: &SearchResult, format: ExportFormat) -> Result<Vec<u8>, ExportError>;
}
