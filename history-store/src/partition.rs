//! Monthly partitions
//!
//! Each partition is a single pretty-printed JSON array named `YYYY-MM.json`.
//! Rewrites go through a temp sibling and a rename so readers never observe a
//! half-written file.

use crate::error::PersistenceError;
use chrono::{DateTime, Datelike, Utc};
use common::HistoryEntry;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    pub year: i32,
    pub month: u32,
}

impl PartitionKey {
    /// `None` unless `month` is 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(timestamp: &DateTime<Utc>) -> Self {
        Self {
            year: timestamp.year(),
            month: timestamp.month(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{:04}-{:02}.json", self.year, self.month)
    }

    /// Inverse of `file_name`; anything else in the directory is ignored
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".json")?;
        let (year, month) = stem.split_once('-')?;
        if year.len() != 4 || month.len() != 2 {
            return None;
        }
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl From<(i32, u32)> for PartitionKey {
    fn from((year, month): (i32, u32)) -> Self {
        Self { year, month }
    }
}

pub fn partition_path(dir: &Path, key: PartitionKey) -> PathBuf {
    dir.join(key.file_name())
}

/// Load a partition. A missing file is an empty partition.
pub async fn read_partition(path: &Path) -> Result<Vec<HistoryEntry>, PersistenceError> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PersistenceError::io(path, e)),
    };

    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&contents).map_err(|source| PersistenceError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace a partition's contents atomically
pub async fn write_partition(path: &Path, entries: &[HistoryEntry]) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(entries).map_err(|source| PersistenceError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = temp_sibling(path);
    if let Err(e) = fs::write(&tmp, json).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(PersistenceError::io(&tmp, e));
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(PersistenceError::io(path, e));
    }

    debug!("Wrote {} entries to {}", entries.len(), path.display());
    Ok(())
}

/// Partitions present in `dir`, oldest first
pub async fn list_partitions(dir: &Path) -> Result<Vec<PartitionKey>, PersistenceError> {
    let mut reader = match fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PersistenceError::io(dir, e)),
    };

    let mut keys = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(|e| PersistenceError::io(dir, e))? {
        if let Some(key) = entry.file_name().to_str().and_then(PartitionKey::parse_file_name) {
            keys.push(key);
        }
    }
    keys.sort();
    Ok(keys)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp-{}", name, Uuid::new_v4()))
}
