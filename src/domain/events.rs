use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::product::Platform;
use super::search::{SearchId, SearchStatus};

/// Progress notification published while a search runs.
///
/// Events for one search carry non-decreasing `progress`; the last event of
/// every search has a terminal `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub search_id: SearchId,
    pub status: SearchStatus,
    pub progress: u8,
    pub message: String,
    /// Products merged so far across all platforms
    pub current_count: usize,
    /// Platform whose completion triggered the event, if any
    pub platform: Option<Platform>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(search_id: SearchId, status: SearchStatus, progress: u8, message: impl Into<String>, current_count: usize) -> Self {
        Self {
            search_id,
            status,
            progress,
            message: message.into(),
            current_count,
            platform: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn for_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
