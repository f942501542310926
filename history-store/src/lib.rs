//! Durable, month-partitioned history of analysis cycles.
//!
//! Layout under `root/stream`:
//!
//! ```text
//! .lock          advisory lock marker (owner token + acquisition time)
//! 2024-03.json   JSON array of history entries for March 2024
//! 2024-04.json
//! ```

pub mod config;
pub mod error;
pub mod lock;
pub mod partition;
pub mod store;

pub use config::StoreConfig;
pub use error::PersistenceError;
pub use partition::PartitionKey;
pub use store::{AppendOutcome, HistoryStore};
