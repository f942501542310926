use common::OhlcvSeries;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod fast_scalper;
pub mod ma_breakout;
pub mod macd_bollinger;
pub mod rsi_stoch_confluence;
pub mod triple_ema;

pub use fast_scalper::FastScalperClassifier;
pub use ma_breakout::MaBreakoutClassifier;
pub use macd_bollinger::MacdBollingerClassifier;
pub use rsi_stoch_confluence::RsiStochConfluenceClassifier;
pub use triple_ema::{TripleEmaClassifier, TripleEmaConfig};

/// Directional verdict type as emitted by classifiers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictType {
    Buy,
    Sell,
    Wait,
    Exit,
}

impl VerdictType {
    /// Case-insensitive parse; anything outside BUY/SELL/WAIT/EXIT is `None`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(VerdictType::Buy),
            "SELL" => Some(VerdictType::Sell),
            "WAIT" => Some(VerdictType::Wait),
            "EXIT" => Some(VerdictType::Exit),
            _ => None,
        }
    }
}

/// Canonical verdict produced by the evaluation engine for one classifier call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierVerdict {
    /// `None` when the classifier emitted no type or one we do not recognise
    #[serde(rename = "type")]
    pub verdict_type: Option<VerdictType>,
    /// Opaque auxiliary data (indicator values, targets, reasons)
    #[serde(default)]
    pub data: Value,
}

impl ClassifierVerdict {
    pub fn new(verdict_type: VerdictType, data: Value) -> Self {
        Self {
            verdict_type: Some(verdict_type),
            data,
        }
    }

    /// Normalize a raw classifier document.
    ///
    /// Accepts the type at top level (`{"type": "BUY"}`), nested under a
    /// signal object (`{"signal": {"type": "BUY"}}`) or as a bare signal
    /// string (`{"signal": "BUY"}`).
    pub fn from_raw(raw: Value) -> Self {
        let type_field = raw
            .get("type")
            .or_else(|| raw.get("signal").and_then(|s| s.get("type")))
            .or_else(|| raw.get("signal").filter(|s| s.is_string()));
        let verdict_type = type_field.and_then(Value::as_str).and_then(VerdictType::parse);

        Self {
            verdict_type,
            data: raw,
        }
    }
}

/// What a classifier hands back before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierOutput {
    Verdict(ClassifierVerdict),
    Raw(Value),
}

impl ClassifierOutput {
    pub fn into_verdict(self) -> ClassifierVerdict {
        match self {
            ClassifierOutput::Verdict(verdict) => verdict,
            ClassifierOutput::Raw(raw) => ClassifierVerdict::from_raw(raw),
        }
    }
}

impl From<ClassifierVerdict> for ClassifierOutput {
    fn from(verdict: ClassifierVerdict) -> Self {
        ClassifierOutput::Verdict(verdict)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClassifierError {
    #[error("insufficient data: need {needed} bars, have {available}")]
    InsufficientData { needed: usize, available: usize },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("classifier panicked: {0}")]
    Panicked(String),
}

/// Stateless rule-based classifier over one series.
///
/// Implementations only read the series; one call per classifier per series.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, series: &OhlcvSeries) -> Result<ClassifierOutput, ClassifierError>;
}

/// Fail with `InsufficientData` unless the series holds at least `needed` bars
pub(crate) fn require_bars(series: &OhlcvSeries, needed: usize) -> Result<(), ClassifierError> {
    if series.len() < needed {
        return Err(ClassifierError::InsufficientData {
            needed,
            available: series.len(),
        });
    }
    Ok(())
}

/// Last value of an indicator output, or `InsufficientData`
pub(crate) fn last_of<T: Copy>(values: &[T], needed: usize, available: usize) -> Result<T, ClassifierError> {
    values
        .last()
        .copied()
        .ok_or(ClassifierError::InsufficientData { needed, available })
}

/// The built-in classifier panel
pub fn default_panel() -> Vec<Box<dyn Classifier>> {
    vec![
        Box::new(TripleEmaClassifier::default()),
        Box::new(MaBreakoutClassifier),
        Box::new(MacdBollingerClassifier),
        Box::new(RsiStochConfluenceClassifier),
        Box::new(FastScalperClassifier),
    ]
}
