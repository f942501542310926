// Fast RSI / Stochastic / MACD scalper
// Oversold with a positive MACD histogram buys at market, overbought with a
// negative histogram sells; everything else waits.

use super::{require_bars, Classifier, ClassifierError, ClassifierOutput, ClassifierVerdict, VerdictType};
use crate::indicators::{macd, rsi, stochastic};
use common::OhlcvSeries;
use serde_json::json;

const RSI_PERIOD: usize = 5;
const STOCH_PERIOD: usize = 3;
const STOCH_SIGNAL: usize = 2;
const MIN_HISTOGRAM: f64 = 0.0001;
const TARGET_PIPS: f64 = 6.0;
const STOP_PIPS: f64 = 2.0;
const MIN_BARS: usize = 13 + 9 - 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct FastScalperClassifier;

impl Classifier for FastScalperClassifier {
    fn name(&self) -> &str {
        "fast-rsi-stoch-macd-scalper"
    }

    fn evaluate(&self, series: &OhlcvSeries) -> Result<ClassifierOutput, ClassifierError> {
        require_bars(series, MIN_BARS)?;
        let close = series.close();
        let insufficient = ClassifierError::InsufficientData {
            needed: MIN_BARS,
            available: series.len(),
        };

        let price = *close.last().ok_or_else(|| insufficient.clone())?;
        let rsi_now = *rsi(close, RSI_PERIOD).last().ok_or_else(|| insufficient.clone())?;
        let stoch_now = *stochastic(series.high(), series.low(), close, STOCH_PERIOD, STOCH_SIGNAL)
            .last()
            .ok_or_else(|| insufficient.clone())?;
        let macd_now = *macd(close, 6, 13, 9).last().ok_or(insufficient)?;

        let overbought = rsi_now > 70.0 && stoch_now.k > 80.0;
        let oversold = rsi_now < 30.0 && stoch_now.k < 20.0;
        let hist = macd_now.histogram;

        let verdict = if oversold && hist > MIN_HISTOGRAM {
            ClassifierVerdict::new(
                VerdictType::Buy,
                json!({ "order": "market", "entry": price, "target": price + TARGET_PIPS, "stop_loss": price - STOP_PIPS }),
            )
        } else if overbought && hist < -MIN_HISTOGRAM {
            ClassifierVerdict::new(
                VerdictType::Sell,
                json!({ "order": "market", "entry": price, "target": price - TARGET_PIPS, "stop_loss": price + STOP_PIPS }),
            )
        } else {
            ClassifierVerdict::new(VerdictType::Wait, json!({ "rsi": rsi_now, "stoch_k": stoch_now.k, "histogram": hist }))
        };

        Ok(verdict.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::flat_series;

    #[test]
    fn test_flat_market_waits() {
        let verdict = FastScalperClassifier.evaluate(&flat_series(40, 1.0)).unwrap().into_verdict();
        assert_eq!(verdict.verdict_type, Some(VerdictType::Wait));
    }
}
