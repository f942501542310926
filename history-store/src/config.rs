//! History store configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one sub-directory per history stream
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Logical history stream; partitions and the lock marker live under `root/stream`
    #[serde(default = "default_stream")]
    pub stream: String,

    /// Age after which a lock marker is considered abandoned (seconds)
    #[serde(default = "default_lock_stale_secs")]
    pub lock_stale_secs: u64,

    /// Write attempts per partition before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between write attempts (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            stream: default_stream(),
            lock_stale_secs: default_lock_stale_secs(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl StoreConfig {
    pub fn stream_dir(&self) -> PathBuf {
        self.root.join(&self.stream)
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("data/history")
}

fn default_stream() -> String {
    "majority".to_string()
}

fn default_lock_stale_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}
