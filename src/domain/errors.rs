//! Error taxonomy for searches
//!
//! Three levels, from narrowest to widest:
//! - [`FetchError`]: one adapter call against one platform. Absorbed into the
//!   search result, never returned to callers.
//! - [`OrchestrationError`]: ends a whole search. Surfaces as `status = failed`.
//! - [`ValidationError`]: rejects a request before anything is spawned.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::product::Platform;
use super::search::SearchId;

/// Failure classes an adapter can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Timeout,
    Blocked,
    ParseFailure,
    NetworkError,
}

impl FetchErrorKind {
    /// Transient kinds are worth another attempt; a block or a parse failure
    /// will recur identically.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Timeout | Self::NetworkError)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Blocked => "blocked",
            Self::ParseFailure => "parse_failure",
            Self::NetworkError => "network_error",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, detail)
    }

    pub fn blocked(detail: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Blocked, detail)
    }

    pub fn parse_failure(detail: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::ParseFailure, detail)
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NetworkError, detail)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Search-level terminal failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationError {
    #[error("all platforms failed")]
    AllPlatformsFailed,

    #[error("cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Malformed search request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("keyword must not be empty")]
    EmptyKeyword,

    #[error("keyword is {length} characters long, maximum is {max}")]
    KeywordTooLong { length: usize, max: usize },

    #[error("at least one platform must be requested")]
    NoPlatforms,

    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),

    #[error("limit {value} is outside {min}..={max}")]
    LimitOutOfRange { value: u32, min: u32, max: u32 },

    #[error("top_n {value} is outside {min}..={max}")]
    TopNOutOfRange { value: u32, min: u32, max: u32 },

    #[error("max_price must be positive")]
    InvalidMaxPrice,

    #[error("min_rating {0} is outside 0..=5")]
    InvalidMinRating(f64),

    #[error("no adapter registered for platform {0}")]
    PlatformUnavailable(Platform),

    #[error("search {0} already exists")]
    DuplicateSearch(SearchId),
}
