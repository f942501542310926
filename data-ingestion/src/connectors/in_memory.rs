use super::{DataFetchError, MarketDataSource};
use async_trait::async_trait;
use common::{OhlcvSeries, TimeframeSpec};
use std::collections::HashMap;

/// In-memory market data source (for testing and development)
///
/// Serves a fixed series per timeframe; timeframes without a series fail with
/// `DataFetchError::Unavailable`.
pub struct InMemorySource {
    series: tokio::sync::RwLock<HashMap<TimeframeSpec, OhlcvSeries>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self {
            series: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, timeframe: TimeframeSpec, series: OhlcvSeries) {
        self.series.write().await.insert(timeframe, series);
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataSource for InMemorySource {
    async fn fetch(&self, timeframe: &TimeframeSpec) -> Result<OhlcvSeries, DataFetchError> {
        let series = self.series.read().await;
        match series.get(timeframe) {
            Some(s) if s.is_empty() => Err(DataFetchError::Empty(timeframe.label())),
            Some(s) => Ok(s.clone()),
            None => Err(DataFetchError::Unavailable(timeframe.label())),
        }
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Candle;

    #[tokio::test]
    async fn test_in_memory_source() {
        let source = InMemorySource::new();
        let candle = Candle {
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
            timestamp: 0,
        };
        source
            .insert(TimeframeSpec::minutes(1), OhlcvSeries::from_candles(&[candle]).unwrap())
            .await;
        source
            .insert(TimeframeSpec::minutes(5), OhlcvSeries::default())
            .await;

        assert_eq!(source.fetch(&TimeframeSpec::minutes(1)).await.unwrap().len(), 1);
        assert!(matches!(
            source.fetch(&TimeframeSpec::minutes(5)).await,
            Err(DataFetchError::Empty(_))
        ));
        assert!(matches!(
            source.fetch(&TimeframeSpec::minutes(15)).await,
            Err(DataFetchError::Unavailable(label)) if label == "15m"
        ));
    }
}
