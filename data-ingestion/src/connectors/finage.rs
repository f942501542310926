use super::{DataFetchError, MarketDataSource};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use common::{Candle, OhlcvSeries, TimeframeSpec};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Upper bound requested from the aggregates endpoint
const REQUEST_LIMIT: u32 = 25_000;

/// Finage aggregate-bars connector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinageConfig {
    /// API root, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Forex pair, e.g. "XAUUSD"
    #[serde(default = "default_pair")]
    pub pair: String,
    #[serde(default)]
    pub api_key: String,
    /// Most recent bars kept from each response
    #[serde(default = "default_max_points")]
    pub max_points: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for FinageConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            pair: default_pair(),
            api_key: String::new(),
            max_points: default_max_points(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.finage.co.uk".to_string()
}

fn default_pair() -> String {
    "XAUUSD".to_string()
}

fn default_max_points() -> usize {
    5000
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Option<Vec<AggregateBar>>,
}

#[derive(Debug, Deserialize)]
struct AggregateBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: f64,
    t: i64,
}

/// HTTP market data source backed by the Finage forex aggregates API
pub struct FinageConnector {
    client: Client,
    config: FinageConfig,
}

impl FinageConnector {
    pub fn new(config: FinageConfig) -> Result<Self, DataFetchError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Days of history requested so a timeframe yields roughly `max_points` bars
    pub fn lookback_days(timeframe: &TimeframeSpec) -> i64 {
        match timeframe.as_minutes() {
            1 => 3,
            5 => 5,
            15 => 8,
            30 => 15,
            60 => 30,
            _ => 5,
        }
    }

    /// Request path for a timeframe relative to `today`; the window ends one day ahead
    pub fn request_path(&self, timeframe: &TimeframeSpec, today: NaiveDate) -> String {
        let start = today - Duration::days(Self::lookback_days(timeframe));
        let end = today + Duration::days(1);
        format!(
            "{}/agg/forex/{}/{}/{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.pair,
            timeframe.interval_value(),
            timeframe.interval_unit(),
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
        )
    }

    fn build_series(&self, mut bars: Vec<AggregateBar>) -> Result<OhlcvSeries, DataFetchError> {
        bars.sort_by_key(|bar| bar.t);
        if bars.len() > self.config.max_points {
            bars.drain(..bars.len() - self.config.max_points);
        }

        let candles: Vec<Candle> = bars
            .iter()
            .map(|bar| Candle {
                open: bar.o,
                high: bar.h,
                low: bar.l,
                close: bar.c,
                volume: bar.v,
                timestamp: bar.t,
            })
            .collect();

        Ok(OhlcvSeries::from_candles(&candles)?)
    }
}

#[async_trait]
impl MarketDataSource for FinageConnector {
    async fn fetch(&self, timeframe: &TimeframeSpec) -> Result<OhlcvSeries, DataFetchError> {
        let url = self.request_path(timeframe, Utc::now().date_naive());
        debug!(timeframe = %timeframe, pair = %self.config.pair, "Fetching aggregates from {}", url);

        let limit = REQUEST_LIMIT.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("apikey", self.config.api_key.as_str()), ("limit", limit.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataFetchError::Status(response.status().as_u16()));
        }

        let payload: AggregateResponse = response
            .json()
            .await
            .map_err(|e| DataFetchError::Malformed(e.to_string()))?;

        let bars = match payload.results {
            Some(bars) if !bars.is_empty() => bars,
            _ => return Err(DataFetchError::Empty(timeframe.label())),
        };

        let series = self.build_series(bars)?;
        info!(timeframe = %timeframe, bars = series.len(), "Fetched market data");
        Ok(series)
    }

    fn name(&self) -> &str {
        "finage"
    }
}
