use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Candle interval unit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Minute,
    Hour,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Minute => "minute",
            IntervalUnit::Hour => "hour",
        }
    }

    /// Single-letter suffix used in timeframe labels ("m", "h")
    pub fn suffix(&self) -> char {
        match self {
            IntervalUnit::Minute => 'm',
            IntervalUnit::Hour => 'h',
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candle granularity for one series, fixed at startup.
///
/// The interval is never zero; deserialization rejects it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "RawTimeframe")]
pub struct TimeframeSpec {
    interval_value: u32,
    interval_unit: IntervalUnit,
}

#[derive(Deserialize)]
struct RawTimeframe {
    interval_value: u32,
    interval_unit: IntervalUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timeframe interval must be positive")]
pub struct ZeroInterval;

impl TryFrom<RawTimeframe> for TimeframeSpec {
    type Error = ZeroInterval;

    fn try_from(raw: RawTimeframe) -> Result<Self, Self::Error> {
        Self::new(raw.interval_value, raw.interval_unit).ok_or(ZeroInterval)
    }
}

impl TimeframeSpec {
    /// Returns `None` for a zero interval.
    pub fn new(interval_value: u32, interval_unit: IntervalUnit) -> Option<Self> {
        if interval_value == 0 {
            return None;
        }
        Some(Self {
            interval_value,
            interval_unit,
        })
    }

    /// # Panics
    ///
    /// Panics if `interval_value` is zero; use [`TimeframeSpec::new`] for untrusted input.
    pub fn minutes(interval_value: u32) -> Self {
        assert!(interval_value > 0, "timeframe interval must be positive");
        Self {
            interval_value,
            interval_unit: IntervalUnit::Minute,
        }
    }

    /// # Panics
    ///
    /// Panics if `interval_value` is zero.
    pub fn hours(interval_value: u32) -> Self {
        assert!(interval_value > 0, "timeframe interval must be positive");
        Self {
            interval_value,
            interval_unit: IntervalUnit::Hour,
        }
    }

    pub fn interval_value(&self) -> u32 {
        self.interval_value
    }

    pub fn interval_unit(&self) -> IntervalUnit {
        self.interval_unit
    }

    /// Label stored with history entries, e.g. "1m", "15m", "4h"
    pub fn label(&self) -> String {
        format!("{}{}", self.interval_value, self.interval_unit.suffix())
    }

    /// Interval length expressed in minutes
    pub fn as_minutes(&self) -> u64 {
        match self.interval_unit {
            IntervalUnit::Minute => self.interval_value as u64,
            IntervalUnit::Hour => self.interval_value as u64 * 60,
        }
    }
}

impl fmt::Display for TimeframeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
