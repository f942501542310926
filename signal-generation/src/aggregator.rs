//! Signal aggregation
//!
//! Reduces heterogeneous verdicts into canonical BUY/SELL/WAIT counts. The
//! reduction is a plain tally plus element-wise sums, so it does not depend on
//! the order classifiers finished or timeframes were processed.

use crate::pipeline::Evaluation;
use crate::signals::{ClassifierVerdict, VerdictType};
use common::{CycleTimeframeResult, SignalCounts};

/// The three buckets every verdict is folded into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalSignal {
    Buy,
    Sell,
    Wait,
}

/// BUY and SELL map to themselves; EXIT, WAIT, missing and unrecognized types are WAIT.
pub fn canonicalize(verdict: Option<&ClassifierVerdict>) -> CanonicalSignal {
    match verdict.and_then(|v| v.verdict_type) {
        Some(VerdictType::Buy) => CanonicalSignal::Buy,
        Some(VerdictType::Sell) => CanonicalSignal::Sell,
        _ => CanonicalSignal::Wait,
    }
}

/// Tally canonical signals; the total equals the number of verdicts given
pub fn tally<'a, I>(verdicts: I) -> SignalCounts
where
    I: IntoIterator<Item = &'a ClassifierVerdict>,
{
    verdicts
        .into_iter()
        .fold(SignalCounts::default(), |mut counts, verdict| {
            match canonicalize(Some(verdict)) {
                CanonicalSignal::Buy => counts.buy += 1,
                CanonicalSignal::Sell => counts.sell += 1,
                CanonicalSignal::Wait => counts.wait += 1,
            }
            counts
        })
}

/// Per-timeframe result from one evaluation
pub fn aggregate_timeframe(timeframe: &str, evaluation: &Evaluation, price: Option<f64>) -> CycleTimeframeResult {
    CycleTimeframeResult {
        timeframe: timeframe.to_string(),
        signals: tally(evaluation.verdicts()),
        price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::NamedVerdict;
    use serde_json::{json, Value};

    fn verdict(raw: Value) -> ClassifierVerdict {
        ClassifierVerdict::from_raw(raw)
    }

    #[test]
    fn test_canonicalization() {
        assert_eq!(canonicalize(None), CanonicalSignal::Wait);
        assert_eq!(canonicalize(Some(&verdict(json!({"type": "EXIT"})))), CanonicalSignal::Wait);
        assert_eq!(canonicalize(Some(&verdict(json!({"type": "MARKET_SELL"})))), CanonicalSignal::Wait);
        assert_eq!(canonicalize(Some(&verdict(json!({"type": null})))), CanonicalSignal::Wait);
        assert_eq!(canonicalize(Some(&verdict(json!({"signal": {"type": "BUY"}})))), CanonicalSignal::Buy);
    }

    #[test]
    fn test_tally_total_matches_verdict_count() {
        let verdicts = vec![
            verdict(json!({"type": "BUY"})),
            verdict(json!({"type": "BUY"})),
            verdict(json!({"type": "SELL"})),
            verdict(json!({"type": "EXIT"})),
            verdict(json!({})),
        ];
        let counts = tally(&verdicts);
        assert_eq!(counts, SignalCounts::new(2, 1, 2));
        assert_eq!(counts.total() as usize, verdicts.len());
    }

    #[test]
    fn test_tally_is_order_independent() {
        let mut verdicts = vec![
            verdict(json!({"type": "BUY"})),
            verdict(json!({"type": "SELL"})),
            verdict(json!({"type": "WAIT"})),
            verdict(json!({"signal": {"type": "SELL"}})),
        ];
        let expected = tally(&verdicts);
        for _ in 0..verdicts.len() {
            verdicts.rotate_left(1);
            assert_eq!(tally(&verdicts), expected);
        }
        verdicts.reverse();
        assert_eq!(tally(&verdicts), expected);
    }

    #[test]
    fn test_aggregate_timeframe_skips_failures() {
        let evaluation = Evaluation {
            verdicts: (0..4)
                .map(|i| NamedVerdict {
                    classifier: format!("c{i}"),
                    verdict: verdict(json!({"type": "BUY"})),
                })
                .collect(),
            failures: vec![crate::pipeline::ClassifierFailure {
                classifier: "broken".into(),
                error: crate::signals::ClassifierError::InvalidInput("nan".into()),
            }],
        };
        let result = aggregate_timeframe("1m", &evaluation, Some(2000.0));
        assert_eq!(result.signals.total(), 4);
        assert_eq!(result.price, Some(2000.0));
    }
}
