// Moving-average breakout classifier (SMA 20 over SMA 50)

use super::{last_of, require_bars, Classifier, ClassifierError, ClassifierOutput, ClassifierVerdict, VerdictType};
use crate::indicators::sma;
use common::OhlcvSeries;
use serde_json::json;

const FAST: usize = 20;
const SLOW: usize = 50;

#[derive(Debug, Clone, Copy, Default)]
pub struct MaBreakoutClassifier;

impl Classifier for MaBreakoutClassifier {
    fn name(&self) -> &str {
        "ma-breakout"
    }

    fn evaluate(&self, series: &OhlcvSeries) -> Result<ClassifierOutput, ClassifierError> {
        require_bars(series, SLOW)?;
        let close = series.close();
        let price = last_of(close, SLOW, series.len())?;
        let ma_fast = last_of(&sma(close, FAST), SLOW, series.len())?;
        let ma_slow = last_of(&sma(close, SLOW), SLOW, series.len())?;

        let verdict_type = if price > ma_fast && ma_fast > ma_slow {
            VerdictType::Buy
        } else if price < ma_fast && ma_fast < ma_slow {
            VerdictType::Sell
        } else {
            VerdictType::Wait
        };

        Ok(ClassifierVerdict::new(verdict_type, json!({ "ma20": ma_fast, "ma50": ma_slow })).into())
    }
}
