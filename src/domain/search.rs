//! Search request and result records

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::AnalysisReport;
use super::errors::{FetchError, FetchErrorKind, ValidationError};
use super::product::{Platform, Product};

pub const MAX_KEYWORD_CHARS: usize = 200;
pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 200;
pub const MIN_TOP_N: u32 = 1;
pub const MAX_TOP_N: u32 = 100;
pub const DEFAULT_TOP_N: u32 = 10;

/// Opaque search identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchId(Uuid);

impl SearchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SearchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ordering applied to the analysis view of results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Keep the adapter's native order
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
    Rating,
    Sold,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub max_price: Option<Decimal>,
    pub min_rating: Option<f64>,
    pub top_n: Option<u32>,
    #[serde(default)]
    pub sort_by: SortBy,
}

impl SearchFilters {
    pub fn top_n(&self) -> usize {
        self.top_n.unwrap_or(DEFAULT_TOP_N) as usize
    }
}

/// A user-initiated search. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub id: SearchId,
    pub keyword: String,
    pub platforms: BTreeSet<Platform>,
    pub limit: u32,
    #[serde(default)]
    pub filters: SearchFilters,
}

impl SearchRequest {
    /// Builds a request with a fresh id. The keyword is trimmed; call
    /// [`SearchRequest::validate`] before handing it to the orchestrator.
    pub fn new(keyword: impl Into<String>, platforms: impl IntoIterator<Item = Platform>, limit: u32) -> Self {
        Self {
            id: SearchId::new(),
            keyword: keyword.into().trim().to_string(),
            platforms: platforms.into_iter().collect(),
            limit,
            filters: SearchFilters::default(),
        }
    }

    #[must_use]
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let keyword = self.keyword.trim();
        if keyword.is_empty() {
            return Err(ValidationError::EmptyKeyword);
        }
        let length = keyword.chars().count();
        if length > MAX_KEYWORD_CHARS {
            return Err(ValidationError::KeywordTooLong {
                length,
                max: MAX_KEYWORD_CHARS,
            });
        }
        if self.platforms.is_empty() {
            return Err(ValidationError::NoPlatforms);
        }
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&self.limit) {
            return Err(ValidationError::LimitOutOfRange {
                value: self.limit,
                min: MIN_LIMIT,
                max: MAX_LIMIT,
            });
        }
        if let Some(top_n) = self.filters.top_n {
            if !(MIN_TOP_N..=MAX_TOP_N).contains(&top_n) {
                return Err(ValidationError::TopNOutOfRange {
                    value: top_n,
                    min: MIN_TOP_N,
                    max: MAX_TOP_N,
                });
            }
        }
        if let Some(max_price) = self.filters.max_price {
            if max_price <= Decimal::ZERO {
                return Err(ValidationError::InvalidMaxPrice);
            }
        }
        if let Some(min_rating) = self.filters.min_rating {
            if !(0.0..=5.0).contains(&min_rating) {
                return Err(ValidationError::InvalidMinRating(min_rating));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Pending,
    Completed,
    Failed,
}

impl SearchStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// Per-platform failure recorded in a search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformError {
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl From<FetchError> for PlatformError {
    fn from(err: FetchError) -> Self {
        Self {
            kind: err.kind,
            detail: err.detail,
        }
    }
}

/// External-facing view of a search.
///
/// While `pending` it is owned by the orchestrator; callers only ever see
/// immutable snapshots of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: SearchId,
    pub keyword: String,
    pub status: SearchStatus,
    pub progress: u8,
    pub results: BTreeMap<Platform, Vec<Product>>,
    pub analysis: Option<AnalysisReport>,
    pub error: Option<String>,
    pub platform_errors: BTreeMap<Platform, PlatformError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SearchResult {
    /// Fresh pending record with an empty entry for every requested platform
    pub fn pending(request: &SearchRequest) -> Self {
        Self {
            id: request.id,
            keyword: request.keyword.clone(),
            status: SearchStatus::Pending,
            progress: 0,
            results: request.platforms.iter().map(|p| (*p, Vec::new())).collect(),
            analysis: None,
            error: None,
            platform_errors: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn total_products(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
