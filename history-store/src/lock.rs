//! Cross-process advisory lock
//!
//! The lock is a marker file next to the partitions. It is created with
//! `create_new`, so exactly one writer can hold it at a time. The marker
//! records an owner token and the acquisition time; a marker older than the
//! stale threshold belongs to a crashed writer and may be reclaimed.
//!
//! Reclaiming renames the marker to a private tombstone first and then checks
//! that the tombstone still holds the marker that was judged stale. If another
//! writer reclaimed and re-created the lock in between, the fresh marker is
//! linked back into place.

use crate::error::PersistenceError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

pub const LOCK_FILE_NAME: &str = ".lock";

/// On-disk marker contents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockMarker {
    pub token: Uuid,
    pub held_since_ms: i64,
}

/// What a reader could make of an existing marker.
///
/// `token` is `None` for markers we cannot parse: a bare millisecond
/// timestamp, or a marker whose creator has not finished writing it yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedMarker {
    pub token: Option<Uuid>,
    pub held_since: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
    stale_after: Duration,
}

impl LockFile {
    pub fn new(dir: &Path, stale_after: Duration) -> Self {
        Self {
            path: dir.join(LOCK_FILE_NAME),
            stale_after,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// One non-blocking acquisition attempt.
    ///
    /// Returns the owner token on success and `None` while someone else
    /// legitimately holds the lock.
    pub async fn try_acquire(&self) -> Result<Option<Uuid>, PersistenceError> {
        if let Some(token) = self.try_create().await? {
            return Ok(Some(token));
        }

        let observed = match self.observe().await? {
            Some(observed) => observed,
            // released between our create and our read
            None => return self.try_create().await,
        };

        if !self.is_stale(&observed) {
            debug!(held_since = %observed.held_since, "History lock busy");
            return Ok(None);
        }

        warn!(
            "Reclaiming stale history lock {} held since {}",
            self.path.display(),
            observed.held_since
        );
        if !self.reclaim(&observed).await? {
            return Ok(None);
        }
        self.try_create().await
    }

    /// Remove the marker if it is still ours
    pub async fn release(&self, token: Uuid) -> Result<(), PersistenceError> {
        match self.observe().await? {
            Some(observed) if observed.token == Some(token) => match fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(PersistenceError::io(&self.path, e)),
            },
            Some(_) => {
                warn!("History lock {} was taken over; leaving it in place", self.path.display());
                Ok(())
            }
            None => {
                warn!("History lock {} vanished before release", self.path.display());
                Ok(())
            }
        }
    }

    /// Read the current marker, `None` if there is none
    pub async fn observe(&self) -> Result<Option<ObservedMarker>, PersistenceError> {
        read_marker(&self.path).await
    }

    fn is_stale(&self, observed: &ObservedMarker) -> bool {
        // a marker from the future is never stale
        (Utc::now() - observed.held_since)
            .to_std()
            .map(|age| age > self.stale_after)
            .unwrap_or(false)
    }

    async fn try_create(&self) -> Result<Option<Uuid>, PersistenceError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(PersistenceError::io(&self.path, e)),
        };

        let marker = LockMarker {
            token: Uuid::new_v4(),
            held_since_ms: Utc::now().timestamp_millis(),
        };
        let body = serde_json::to_vec(&marker).map_err(|source| PersistenceError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let written = async {
            file.write_all(&body).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            let _ = fs::remove_file(&self.path).await;
            return Err(PersistenceError::io(&self.path, e));
        }

        debug!(token = %marker.token, "Acquired history lock");
        Ok(Some(marker.token))
    }

    /// Move a stale marker out of the way.
    ///
    /// Returns `true` when the caller may try to create the lock again.
    pub(crate) async fn reclaim(&self, observed: &ObservedMarker) -> Result<bool, PersistenceError> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| LOCK_FILE_NAME.to_string());
        let tombstone = self.path.with_file_name(format!("{}.stale-{}", file_name, Uuid::new_v4()));

        match fs::rename(&self.path, &tombstone).await {
            Ok(()) => {}
            // another writer reclaimed it first
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(PersistenceError::io(&self.path, e)),
        }

        let moved = read_marker(&tombstone).await?;
        if moved.as_ref() == Some(observed) {
            let _ = fs::remove_file(&tombstone).await;
            return Ok(true);
        }

        // We moved a marker that was created after our observation. Put it back.
        match fs::hard_link(&tombstone, &self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!("History lock {} re-created while restoring a live marker", self.path.display());
            }
            Err(e) => {
                let _ = fs::remove_file(&tombstone).await;
                return Err(PersistenceError::io(&self.path, e));
            }
        }
        let _ = fs::remove_file(&tombstone).await;
        Ok(false)
    }
}

async fn read_marker(path: &Path) -> Result<Option<ObservedMarker>, PersistenceError> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistenceError::io(path, e)),
    };

    if let Ok(marker) = serde_json::from_str::<LockMarker>(&contents) {
        if let Some(held_since) = Utc.timestamp_millis_opt(marker.held_since_ms).single() {
            return Ok(Some(ObservedMarker {
                token: Some(marker.token),
                held_since,
            }));
        }
    }

    // bare millisecond timestamp
    if let Some(held_since) = contents
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    {
        return Ok(Some(ObservedMarker { token: None, held_since }));
    }

    // partially written or foreign marker; age it by mtime
    let modified = match fs::metadata(path).await {
        Ok(meta) => meta.modified().map_err(|e| PersistenceError::io(path, e))?,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistenceError::io(path, e)),
    };
    Ok(Some(ObservedMarker {
        token: None,
        held_since: DateTime::<Utc>::from(modified),
    }))
}
