//! Shared data model for the analysis workspace
//!
//! Every crate in the pipeline (market data, classifiers, history store and the
//! service binary) speaks in terms of these types.

pub mod analysis;
pub mod series;
pub mod timeframe;
pub mod timestamp;

pub use analysis::{AnalysisCycle, CycleTimeframeResult, HistoryEntry, SignalCounts};
pub use series::{Candle, OhlcvSeries, SeriesError};
pub use timeframe::{IntervalUnit, TimeframeSpec, ZeroInterval};

// Re-exported so downstream crates agree on one chrono version
pub use chrono::{DateTime, Utc};
