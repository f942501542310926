// Signal Generation
// Classifier panel, evaluation engine and verdict aggregation

pub mod aggregator;
pub mod indicators;
pub mod pipeline;
pub mod signals;

pub use aggregator::{aggregate_timeframe, canonicalize, tally, CanonicalSignal};
pub use pipeline::{ClassifierFailure, Evaluation, EvaluationEngine, NamedVerdict};
pub use signals::{
    default_panel, Classifier, ClassifierError, ClassifierOutput, ClassifierVerdict, VerdictType,
    FastScalperClassifier, MaBreakoutClassifier, MacdBollingerClassifier, RsiStochConfluenceClassifier,
    TripleEmaClassifier, TripleEmaConfig,
};
