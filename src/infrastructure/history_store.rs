//! In-memory search history

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{HistoryEntry, HistoryError, HistoryStore, SearchId, SearchRequest, SearchResult};

struct Record {
    entry: HistoryEntry,
    created_at: DateTime<Utc>,
    /// Insertion order, breaks ties between equal timestamps
    sequence: u64,
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
    records: RwLock<HashMap<SearchId, Record>>,
    next_sequence: std::sync::atomic::AtomicU64,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn create(&self, request: &SearchRequest) -> Result<(), HistoryError> {
        let mut records = self.records.write().await;
        if records.contains_key(&request.id) {
            return Err(HistoryError::Duplicate(request.id));
        }
        let sequence = self.next_sequence.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        records.insert(
            request.id,
            Record {
                entry: HistoryEntry {
                    request: request.clone(),
                    result: None,
                },
                created_at: Utc::now(),
                sequence,
            },
        );
        debug!("History: created search {}", request.id);
        Ok(())
    }

    async fn record(&self, result: &SearchResult) -> Result<(), HistoryError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&result.id).ok_or(HistoryError::NotFound(result.id))?;
        record.entry.result = Some(result.clone());
        debug!("History: recorded {} result for search {}", result.status, result.id);
        Ok(())
    }

    async fn get(&self, id: SearchId) -> Option<HistoryEntry> {
        self.records.read().await.get(&id).map(|r| r.entry.clone())
    }

    async fn list(&self, limit: usize) -> Vec<HistoryEntry> {
        let records = self.records.read().await;
        let mut ordered: Vec<&Record> = records.values().collect();
        ordered.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.sequence.cmp(&a.sequence))
        });
        ordered.into_iter().take(limit).map(|r| r.entry.clone()).collect()
    }

    async fn delete(&self, id: SearchId) -> Result<(), HistoryError> {
        self.records
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(HistoryError::NotFound(id))
    }

    async fn clear(&self) {
        self.records.write().await.clear();
    }
}
