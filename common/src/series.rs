use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("column length mismatch: {column} has {actual} values, expected {expected}")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("timestamps are not ascending at index {0}")]
    NotAscending(usize),
}

/// One OHLCV bar
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Bar open time, epoch milliseconds
    pub timestamp: i64,
}

/// Time-ascending OHLCV columns of equal length.
///
/// Built once per fetch and only read afterwards; fields are private so the
/// length and ordering invariants cannot be broken by consumers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OhlcvSeries {
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
    timestamp: Vec<i64>,
}

impl OhlcvSeries {
    pub fn new(
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<f64>,
        timestamp: Vec<i64>,
    ) -> Result<Self, SeriesError> {
        let expected = close.len();
        for (column, actual) in [
            ("open", open.len()),
            ("high", high.len()),
            ("low", low.len()),
            ("volume", volume.len()),
            ("timestamp", timestamp.len()),
        ] {
            if actual != expected {
                return Err(SeriesError::LengthMismatch {
                    column,
                    expected,
                    actual,
                });
            }
        }
        if let Some(idx) = timestamp.windows(2).position(|w| w[1] < w[0]) {
            return Err(SeriesError::NotAscending(idx + 1));
        }

        Ok(Self {
            open,
            high,
            low,
            close,
            volume,
            timestamp,
        })
    }

    pub fn from_candles(candles: &[Candle]) -> Result<Self, SeriesError> {
        Self::new(
            candles.iter().map(|c| c.open).collect(),
            candles.iter().map(|c| c.high).collect(),
            candles.iter().map(|c| c.low).collect(),
            candles.iter().map(|c| c.close).collect(),
            candles.iter().map(|c| c.volume).collect(),
            candles.iter().map(|c| c.timestamp).collect(),
        )
    }

    /// Drop everything but the most recent `n` bars
    pub fn retain_recent(&mut self, n: usize) {
        let len = self.len();
        if len <= n {
            return;
        }
        let skip = len - n;
        self.open.drain(..skip);
        self.high.drain(..skip);
        self.low.drain(..skip);
        self.close.drain(..skip);
        self.volume.drain(..skip);
        self.timestamp.drain(..skip);
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn open(&self) -> &[f64] {
        &self.open
    }

    pub fn high(&self) -> &[f64] {
        &self.high
    }

    pub fn low(&self) -> &[f64] {
        &self.low
    }

    pub fn close(&self) -> &[f64] {
        &self.close
    }

    pub fn volume(&self) -> &[f64] {
        &self.volume
    }

    pub fn timestamp(&self) -> &[i64] {
        &self.timestamp
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close.last().copied()
    }

    pub fn candle(&self, idx: usize) -> Option<Candle> {
        if idx >= self.len() {
            return None;
        }
        Some(Candle {
            open: self.open[idx],
            high: self.high[idx],
            low: self.low[idx],
            close: self.close[idx],
            volume: self.volume[idx],
            timestamp: self.timestamp[idx],
        })
    }
}
