// MACD / Bollinger breakout classifier
// Emits a raw document with the verdict type at top level; the evaluation
// engine normalizes it.

use super::{require_bars, Classifier, ClassifierError, ClassifierOutput};
use crate::indicators::{bollinger, macd};
use common::OhlcvSeries;
use serde_json::json;

const MACD_FAST: usize = 6;
const MACD_SLOW: usize = 13;
const MACD_SIGNAL: usize = 5;
const BB_PERIOD: usize = 10;
const BB_STD_DEV: f64 = 2.0;

/// Bars needed for two consecutive MACD points
const MIN_BARS: usize = MACD_SLOW + MACD_SIGNAL;

#[derive(Debug, Clone, Copy, Default)]
pub struct MacdBollingerClassifier;

impl Classifier for MacdBollingerClassifier {
    fn name(&self) -> &str {
        "macd-bollinger-breakout"
    }

    fn evaluate(&self, series: &OhlcvSeries) -> Result<ClassifierOutput, ClassifierError> {
        require_bars(series, MIN_BARS)?;
        let close = series.close();
        let macd_points = macd(close, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let bands = bollinger(close, BB_PERIOD, BB_STD_DEV);

        let (prev, curr, band, price) = match (
            macd_points.len().checked_sub(2).map(|i| &macd_points[i..]),
            bands.last(),
            close.last(),
        ) {
            (Some([prev, curr]), Some(band), Some(price)) => (*prev, *curr, *band, *price),
            _ => {
                return Err(ClassifierError::InsufficientData {
                    needed: MIN_BARS,
                    available: series.len(),
                })
            }
        };

        let cross_up = prev.macd <= prev.signal && curr.macd > curr.signal;
        let cross_down = prev.macd >= prev.signal && curr.macd < curr.signal;
        let above_upper = price > band.upper;
        let below_lower = price < band.lower;
        let within_bands = !above_upper && !below_lower;

        let (verdict_type, reason) = if above_upper && cross_up {
            ("BUY", "price above upper band with bullish MACD cross")
        } else if below_lower && cross_down {
            ("SELL", "price below lower band with bearish MACD cross")
        } else if within_bands || cross_down {
            ("EXIT", "price inside bands or MACD crossed down")
        } else {
            ("WAIT", "no clear breakout")
        };

        Ok(ClassifierOutput::Raw(json!({
            "type": verdict_type,
            "reason": reason,
            "indicators": {
                "macd": curr.macd,
                "signal": curr.signal,
                "histogram": curr.histogram,
                "bb_upper": band.upper,
                "bb_middle": band.middle,
                "bb_lower": band.lower,
            }
        })))
    }
}
