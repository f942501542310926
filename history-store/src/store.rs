// History Store
// Append-only, month-partitioned record of analysis cycles shared by every
// writer pointed at the same directory.

use crate::config::StoreConfig;
use crate::error::PersistenceError;
use crate::lock::LockFile;
use crate::partition::{self, PartitionKey};
use chrono::{DateTime, Utc};
use common::HistoryEntry;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Result of one append call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Entries newly written
    pub appended: usize,
    /// Entries skipped because their id was already stored
    pub duplicates: usize,
}

impl std::ops::AddAssign for AppendOutcome {
    fn add_assign(&mut self, other: Self) {
        self.appended += other.appended;
        self.duplicates += other.duplicates;
    }
}

pub struct HistoryStore {
    config: StoreConfig,
    dir: PathBuf,
    lock: LockFile,
    /// Serializes writers sharing this instance; the marker file covers other processes
    writer: Mutex<()>,
}

impl HistoryStore {
    pub fn new(config: StoreConfig) -> Self {
        let dir = config.stream_dir();
        let lock = LockFile::new(&dir, config.lock_stale_after());
        info!("History store at {}", dir.display());
        Self {
            config,
            dir,
            lock,
            writer: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append entries, grouped by the month of their timestamp.
    ///
    /// Entries whose id is already in their partition are skipped, so
    /// re-appending a batch is a no-op. Each partition is rewritten under the
    /// lock, retrying on contention or I/O failure up to `max_attempts` times.
    /// Partitions earlier in the batch stay written if a later one fails.
    pub async fn append(&self, entries: &[HistoryEntry]) -> Result<AppendOutcome, PersistenceError> {
        let mut groups: BTreeMap<PartitionKey, Vec<&HistoryEntry>> = BTreeMap::new();
        for entry in entries {
            groups.entry(PartitionKey::from(entry.partition_key())).or_default().push(entry);
        }

        let mut outcome = AppendOutcome::default();
        for (key, group) in groups {
            outcome += self.append_partition(key, &group).await?;
        }
        Ok(outcome)
    }

    async fn append_partition(
        &self,
        key: PartitionKey,
        entries: &[&HistoryEntry],
    ) -> Result<AppendOutcome, PersistenceError> {
        let _serial = self.writer.lock().await;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PersistenceError::io(&self.dir, e))?;

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_append(key, entries, attempt).await {
                Ok(outcome) => {
                    debug!(
                        partition = %key,
                        appended = outcome.appended,
                        duplicates = outcome.duplicates,
                        "History append complete"
                    );
                    return Ok(outcome);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(partition = %key, attempt, "History append failed, retrying: {}", e);
                    tokio::time::sleep(self.config.retry_backoff()).await;
                }
                Err(e) => {
                    error!(partition = %key, attempt, "History append failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    async fn try_append(
        &self,
        key: PartitionKey,
        entries: &[&HistoryEntry],
        attempt: u32,
    ) -> Result<AppendOutcome, PersistenceError> {
        let token = match self.lock.try_acquire().await? {
            Some(token) => token,
            None => return Err(PersistenceError::LockContention { attempts: attempt }),
        };

        let result = self.merge_into(key, entries).await;

        if let Err(e) = self.lock.release(token).await {
            // data already on disk; the marker will age out
            error!("Failed to release history lock: {}", e);
        }
        result
    }

    /// Read-merge-rewrite of one partition. Caller holds the lock.
    async fn merge_into(&self, key: PartitionKey, entries: &[&HistoryEntry]) -> Result<AppendOutcome, PersistenceError> {
        let path = partition::partition_path(&self.dir, key);
        let mut stored = partition::read_partition(&path).await?;

        let mut seen: HashSet<String> = stored.iter().map(|e| e.id.clone()).collect();
        let fresh: Vec<HistoryEntry> = entries
            .iter()
            .filter(|e| seen.insert(e.id.clone()))
            .map(|e| (*e).clone())
            .collect();

        let outcome = AppendOutcome {
            appended: fresh.len(),
            duplicates: entries.len() - fresh.len(),
        };
        if fresh.is_empty() {
            return Ok(outcome);
        }

        stored.extend(fresh);
        partition::write_partition(&path, &stored).await?;
        Ok(outcome)
    }

    /// Entries of one month, in append order. Missing months are empty.
    pub async fn read_partition(&self, year: i32, month: u32) -> Result<Vec<HistoryEntry>, PersistenceError> {
        match PartitionKey::new(year, month) {
            Some(key) => partition::read_partition(&partition::partition_path(&self.dir, key)).await,
            None => Ok(Vec::new()),
        }
    }

    /// Entries with `start <= timestamp <= end`, oldest partition first.
    ///
    /// Corrupt partitions are logged and skipped.
    pub async fn read_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<HistoryEntry>, PersistenceError> {
        if start > end {
            return Ok(Vec::new());
        }

        let first = PartitionKey::of(&start);
        let last = PartitionKey::of(&end);

        let mut entries = Vec::new();
        for key in self.partitions().await? {
            if key < first || key > last {
                continue;
            }

            let path = partition::partition_path(&self.dir, key);
            match partition::read_partition(&path).await {
                Ok(stored) => entries.extend(
                    stored
                        .into_iter()
                        .filter(|e| e.timestamp >= start && e.timestamp <= end),
                ),
                Err(e @ PersistenceError::Corrupt { .. }) => {
                    warn!(partition = %key, "Skipping unreadable partition: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(entries)
    }

    /// Partitions currently on disk, oldest first
    pub async fn partitions(&self) -> Result<Vec<PartitionKey>, PersistenceError> {
        partition::list_partitions(&self.dir).await
    }
}
