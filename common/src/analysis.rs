// Analysis cycle results and their persisted projection

use crate::timestamp::{self, format_millis};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Canonical BUY/SELL/WAIT tally
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SignalCounts {
    #[serde(rename = "BUY")]
    pub buy: u32,
    #[serde(rename = "SELL")]
    pub sell: u32,
    #[serde(rename = "WAIT")]
    pub wait: u32,
}

impl SignalCounts {
    pub fn new(buy: u32, sell: u32, wait: u32) -> Self {
        Self { buy, sell, wait }
    }

    pub fn total(&self) -> u32 {
        self.buy + self.sell + self.wait
    }
}

impl Add for SignalCounts {
    type Output = SignalCounts;

    fn add(self, rhs: SignalCounts) -> SignalCounts {
        SignalCounts {
            buy: self.buy + rhs.buy,
            sell: self.sell + rhs.sell,
            wait: self.wait + rhs.wait,
        }
    }
}

impl AddAssign for SignalCounts {
    fn add_assign(&mut self, rhs: SignalCounts) {
        *self = *self + rhs;
    }
}

impl Sum for SignalCounts {
    fn sum<I: Iterator<Item = SignalCounts>>(iter: I) -> Self {
        iter.fold(SignalCounts::default(), Add::add)
    }
}

impl<'a> Sum<&'a SignalCounts> for SignalCounts {
    fn sum<I: Iterator<Item = &'a SignalCounts>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Aggregated verdicts for one timeframe in one cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleTimeframeResult {
    pub timeframe: String,
    pub signals: SignalCounts,
    /// Last close of the evaluated series
    pub price: Option<f64>,
}

/// One pipeline pass across every configured timeframe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisCycle {
    #[serde(with = "timestamp::millis")]
    pub timestamp: DateTime<Utc>,
    pub timeframes: Vec<CycleTimeframeResult>,
    pub overall: SignalCounts,
}

impl AnalysisCycle {
    /// Build a cycle; `overall` is the element-wise sum of the per-timeframe counts.
    pub fn new(timestamp: DateTime<Utc>, timeframes: Vec<CycleTimeframeResult>) -> Self {
        let overall: SignalCounts = timeframes.iter().map(|tf| &tf.signals).sum();
        Self {
            timestamp: timestamp::truncate_millis(timestamp),
            timeframes,
            overall,
        }
    }

    /// Project the cycle into one history entry per timeframe
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        self.timeframes
            .iter()
            .map(|tf| HistoryEntry {
                id: HistoryEntry::entry_id(&self.timestamp, &tf.timeframe),
                timestamp: self.timestamp,
                timeframe: tf.timeframe.clone(),
                signals: tf.signals,
                price: tf.price,
                overall: self.overall,
            })
            .collect()
    }
}

/// Persisted row of the analysis history; never mutated once written
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(with = "timestamp::millis")]
    pub timestamp: DateTime<Utc>,
    pub timeframe: String,
    pub signals: SignalCounts,
    pub price: Option<f64>,
    pub overall: SignalCounts,
}

impl HistoryEntry {
    /// `<timestamp>-<timeframe label>`, unique within a partition
    pub fn entry_id(timestamp: &DateTime<Utc>, timeframe: &str) -> String {
        format!("{}-{}", format_millis(timestamp), timeframe)
    }

    /// (year, month) of the partition this entry belongs to
    pub fn partition_key(&self) -> (i32, u32) {
        (self.timestamp.year(), self.timestamp.month())
    }
}
