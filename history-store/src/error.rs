use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("history lock still held by another writer after {attempts} attempts")]
    LockContention { attempts: u32 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt partition {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Contention and I/O failures are worth another attempt; a corrupt
    /// partition is not, and is never overwritten.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PersistenceError::LockContention { .. } | PersistenceError::Io { .. })
    }
}
