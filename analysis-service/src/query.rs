//! History read API
//!
//! Thin layer over the store for clients. Missing partitions and ranges come
//! back empty; read failures are logged and also come back empty.

use chrono::{DateTime, Utc};
use common::HistoryEntry;
use history_store::HistoryStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;

pub struct HistoryQuery {
    store: Arc<HistoryStore>,
    labels: Vec<String>,
}

impl HistoryQuery {
    /// `labels` are reported even when they have no entries in range
    pub fn new(store: Arc<HistoryStore>, labels: Vec<String>) -> Self {
        Self { store, labels }
    }

    /// Entries in `[start, end]` grouped by timeframe label.
    ///
    /// `start` defaults to the Unix epoch (`DateTime::default`) and `end` to now.
    pub async fn by_timeframe(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> BTreeMap<String, Vec<HistoryEntry>> {
        let start = start.unwrap_or_default();
        let end = end.unwrap_or_else(Utc::now);

        let mut grouped: BTreeMap<String, Vec<HistoryEntry>> =
            self.labels.iter().map(|label| (label.clone(), Vec::new())).collect();

        let entries = match self.store.read_range(start, end).await {
            Ok(entries) => entries,
            Err(e) => {
                error!("History range read failed: {}", e);
                return grouped;
            }
        };

        for entry in entries {
            grouped.entry(entry.timeframe.clone()).or_default().push(entry);
        }
        grouped
    }

    /// Raw contents of one monthly partition
    pub async fn month(&self, year: i32, month: u32) -> Vec<HistoryEntry> {
        match self.store.read_partition(year, month).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(year, month, "History partition read failed: {}", e);
                Vec::new()
            }
        }
    }
}
