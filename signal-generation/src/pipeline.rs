// Strategy Evaluation Engine
// Fans one market data snapshot out to every registered classifier and
// normalizes each output into a canonical verdict right after the call.

use super::signals::{Classifier, ClassifierError, ClassifierVerdict};
use common::OhlcvSeries;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Verdict from one named classifier
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NamedVerdict {
    pub classifier: String,
    pub verdict: ClassifierVerdict,
}

/// A classifier that produced no verdict this time
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierFailure {
    pub classifier: String,
    pub error: ClassifierError,
}

/// Outcome of evaluating one series against the whole panel.
///
/// Failed classifiers appear only in `failures`; they never contribute a verdict.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub verdicts: Vec<NamedVerdict>,
    pub failures: Vec<ClassifierFailure>,
}

impl Evaluation {
    pub fn verdicts(&self) -> impl Iterator<Item = &ClassifierVerdict> {
        self.verdicts.iter().map(|v| &v.verdict)
    }
}

/// Strategy evaluation engine
pub struct EvaluationEngine {
    classifiers: Vec<Box<dyn Classifier>>,
}

impl EvaluationEngine {
    pub fn new() -> Self {
        Self {
            classifiers: Vec::new(),
        }
    }

    /// Engine preloaded with the given panel
    pub fn with_panel(panel: Vec<Box<dyn Classifier>>) -> Self {
        let engine = Self { classifiers: panel };
        info!("Evaluation engine ready with {} classifiers", engine.classifier_count());
        engine
    }

    /// Register a classifier
    pub fn add_classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        info!("Adding classifier: {}", classifier.name());
        self.classifiers.push(classifier);
        self
    }

    /// Run every classifier against `series`.
    ///
    /// Classifiers run one after another on the calling task. A classifier
    /// that errors or panics is logged and skipped.
    pub fn evaluate(&self, series: &OhlcvSeries) -> Evaluation {
        let mut evaluation = Evaluation::default();

        for classifier in &self.classifiers {
            let name = classifier.name().to_string();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| classifier.evaluate(series)))
                .unwrap_or_else(|payload| Err(ClassifierError::Panicked(panic_message(payload))));

            match outcome {
                Ok(output) => {
                    let verdict = output.into_verdict();
                    debug!(classifier = %name, verdict = ?verdict.verdict_type, "Classifier verdict");
                    evaluation.verdicts.push(NamedVerdict {
                        classifier: name,
                        verdict,
                    });
                }
                Err(error) => {
                    warn!(classifier = %name, "Classifier failed: {}", error);
                    evaluation.failures.push(ClassifierFailure {
                        classifier: name,
                        error,
                    });
                }
            }
        }

        evaluation
    }

    /// Get the number of registered classifiers
    pub fn classifier_count(&self) -> usize {
        self.classifiers.len()
    }

    pub fn classifier_names(&self) -> Vec<&str> {
        self.classifiers.iter().map(|c| c.name()).collect()
    }
}

impl Default for EvaluationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
