pub mod finage;
pub mod in_memory;

pub use finage::{FinageConfig, FinageConnector};
pub use in_memory::InMemorySource;

use async_trait::async_trait;
use common::{SeriesError, TimeframeSpec, OhlcvSeries};
use thiserror::Error;

/// Failure to obtain a series for one timeframe
#[derive(Debug, Error)]
pub enum DataFetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("no data returned for {0}")]
    Empty(String),
    #[error("malformed market data: {0}")]
    Malformed(String),
    #[error("timeframe {0} is not available from this source")]
    Unavailable(String),
}

impl From<SeriesError> for DataFetchError {
    fn from(err: SeriesError) -> Self {
        DataFetchError::Malformed(err.to_string())
    }
}

/// Source of bounded, time-ascending OHLCV series
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch the latest series for a timeframe. An empty upstream response is an error.
    async fn fetch(&self, timeframe: &TimeframeSpec) -> Result<OhlcvSeries, DataFetchError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}
