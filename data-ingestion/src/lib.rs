//! Market data retrieval and realtime fan-out
//!
//! - `connectors`: the `MarketDataSource` seam plus the HTTP and in-memory sources
//! - `event_bus`: best-effort broadcast of completed analysis cycles to live sessions,
//!   plus per-session request/reply

pub mod connectors;
pub mod event_bus;

pub use connectors::{DataFetchError, FinageConfig, FinageConnector, InMemorySource, MarketDataSource};
pub use event_bus::{RealtimeEvent, RealtimePublisher, Session, SessionInfo, SessionRequest};
