// RSI / Stochastic / SMA-direction confluence classifier
// Emits the verdict nested under `signal`, alongside the indicator snapshot.

use super::{require_bars, Classifier, ClassifierError, ClassifierOutput};
use crate::indicators::{rsi, sma, stochastic};
use common::OhlcvSeries;
use serde_json::json;

const RSI_PERIOD: usize = 14;
const STOCH_PERIOD: usize = 14;
const STOCH_SIGNAL: usize = 3;
const SMA_PERIOD: usize = 50;
const MIN_BARS: usize = SMA_PERIOD + 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct RsiStochConfluenceClassifier;

impl Classifier for RsiStochConfluenceClassifier {
    fn name(&self) -> &str {
        "rsi-stochastic-sma-confluence"
    }

    fn evaluate(&self, series: &OhlcvSeries) -> Result<ClassifierOutput, ClassifierError> {
        require_bars(series, MIN_BARS)?;
        let close = series.close();
        let rsi_values = rsi(close, RSI_PERIOD);
        let stoch = stochastic(series.high(), series.low(), close, STOCH_PERIOD, STOCH_SIGNAL);
        let sma_values = sma(close, SMA_PERIOD);

        let insufficient = || ClassifierError::InsufficientData {
            needed: MIN_BARS,
            available: series.len(),
        };
        let rsi_now = *rsi_values.last().ok_or_else(insufficient)?;
        let stoch_now = *stoch.last().ok_or_else(insufficient)?;
        let (sma_prev, sma_now) = match sma_values.len().checked_sub(2).map(|i| &sma_values[i..]) {
            Some([prev, now]) => (*prev, *now),
            _ => return Err(insufficient()),
        };
        let rising = sma_now > sma_prev;

        let verdict_type = if rsi_now < 30.0 && stoch_now.k < 20.0 && rising {
            "BUY"
        } else if rsi_now > 70.0 && stoch_now.k > 80.0 && !rising {
            "SELL"
        } else if (40.0..=60.0).contains(&rsi_now) || (40.0..=60.0).contains(&stoch_now.k) {
            "EXIT"
        } else {
            "WAIT"
        };

        Ok(ClassifierOutput::Raw(json!({
            "signal": { "type": verdict_type },
            "indicators": {
                "rsi": rsi_now,
                "stoch_k": stoch_now.k,
                "stoch_d": stoch_now.d,
                "sma50": sma_now,
                "trend": if rising { "up" } else { "down" },
            }
        })))
    }
}
