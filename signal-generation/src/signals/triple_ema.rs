// Triple EMA trend classifier
// Price above EMA 5/10/50 is a BUY, below all three a SELL, anything else WAIT.

use super::{last_of, require_bars, Classifier, ClassifierError, ClassifierOutput, ClassifierVerdict, VerdictType};
use crate::indicators::ema;
use common::OhlcvSeries;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct TripleEmaConfig {
    pub fast_period: usize,
    pub mid_period: usize,
    pub slow_period: usize,
    /// Distance from price to the reported profit target
    pub target_offset: f64,
}

impl Default for TripleEmaConfig {
    fn default() -> Self {
        Self {
            fast_period: 5,
            mid_period: 10,
            slow_period: 50,
            target_offset: 4.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TripleEmaClassifier {
    config: TripleEmaConfig,
}

impl TripleEmaClassifier {
    pub fn new(config: TripleEmaConfig) -> Self {
        Self { config }
    }
}

impl Classifier for TripleEmaClassifier {
    fn name(&self) -> &str {
        "triple-ema-trend"
    }

    fn evaluate(&self, series: &OhlcvSeries) -> Result<ClassifierOutput, ClassifierError> {
        let cfg = &self.config;
        let needed = cfg.fast_period.max(cfg.mid_period).max(cfg.slow_period);
        require_bars(series, needed)?;

        let close = series.close();
        let price = last_of(close, needed, series.len())?;
        let fast = last_of(&ema(close, cfg.fast_period), needed, series.len())?;
        let mid = last_of(&ema(close, cfg.mid_period), needed, series.len())?;
        let slow = last_of(&ema(close, cfg.slow_period), needed, series.len())?;

        let (verdict_type, target) = if price > fast && price > mid && price > slow {
            (VerdictType::Buy, Some(price + cfg.target_offset))
        } else if price < fast && price < mid && price < slow {
            (VerdictType::Sell, Some(price - cfg.target_offset))
        } else {
            (VerdictType::Wait, None)
        };

        Ok(ClassifierVerdict::new(
            verdict_type,
            json!({
                "ema_fast": fast,
                "ema_mid": mid,
                "ema_slow": slow,
                "target": target,
            }),
        )
        .into())
    }
}
