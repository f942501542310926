//! Ad-hoc analysis for a single session
//!
//! A session asks for one timeframe and gets the panel's verdicts back
//! directly. Nothing is stored or broadcast; the reply goes to the requesting
//! session only.

use common::{SignalCounts, TimeframeSpec};
use data_ingestion::{MarketDataSource, RealtimeEvent, RealtimePublisher, SessionRequest};
use serde::{Deserialize, Serialize};
use signal_generation::{tally, EvaluationEngine, NamedVerdict};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub timeframe: TimeframeSpec,
    /// Restrict the reply to one classifier
    #[serde(default)]
    pub strategy_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub timeframe: String,
    pub series_len: usize,
    pub reference_price: Option<f64>,
    pub verdicts: Vec<NamedVerdict>,
    pub counts: SignalCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisError {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum AnalysisReply {
    AnalysisResult(AnalysisResult),
    AnalysisError(AnalysisError),
}

impl AnalysisReply {
    pub fn into_event(self) -> RealtimeEvent {
        match self {
            AnalysisReply::AnalysisResult(result) => match serde_json::to_value(&result) {
                Ok(payload) => RealtimeEvent::AnalysisResult(payload),
                Err(e) => {
                    error!("Failed to encode analysis result: {}", e);
                    RealtimeEvent::AnalysisError {
                        message: "Failed to perform analysis".to_string(),
                    }
                }
            },
            AnalysisReply::AnalysisError(err) => RealtimeEvent::AnalysisError { message: err.message },
        }
    }
}

pub struct AdHocAnalyzer {
    source: Arc<dyn MarketDataSource>,
    engine: Arc<EvaluationEngine>,
    max_points: usize,
}

impl AdHocAnalyzer {
    pub fn new(source: Arc<dyn MarketDataSource>, engine: Arc<EvaluationEngine>, max_points: usize) -> Self {
        Self {
            source,
            engine,
            max_points: max_points.max(1),
        }
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisReply {
        let label = request.timeframe.label();

        if let Some(strategy) = &request.strategy_id {
            if !self.engine.classifier_names().contains(&strategy.as_str()) {
                return AnalysisReply::AnalysisError(AnalysisError {
                    message: format!("Unknown strategy: {}", strategy),
                });
            }
        }

        let mut series = match self.source.fetch(&request.timeframe).await {
            Ok(series) => series,
            Err(e) => {
                error!(timeframe = %label, "Ad-hoc analysis failed: {}", e);
                return AnalysisReply::AnalysisError(AnalysisError {
                    message: "Failed to perform analysis".to_string(),
                });
            }
        };
        series.retain_recent(self.max_points);

        let mut verdicts = self.engine.evaluate(&series).verdicts;
        if let Some(strategy) = &request.strategy_id {
            verdicts.retain(|v| &v.classifier == strategy);
        }
        let counts = tally(verdicts.iter().map(|v| &v.verdict));

        info!(timeframe = %label, verdicts = verdicts.len(), "Ad-hoc analysis complete");
        AnalysisReply::AnalysisResult(AnalysisResult {
            timeframe: label,
            series_len: series.len(),
            reference_price: series.last_close(),
            verdicts,
            counts,
        })
    }

    /// Answer one session request, replying to that session only
    pub async fn handle(&self, publisher: &RealtimePublisher, request: SessionRequest) {
        let reply = match serde_json::from_value::<AnalysisRequest>(request.payload) {
            Ok(parsed) => self.analyze(&parsed).await,
            Err(e) => {
                warn!(session_id = %request.session_id, "Invalid analysis request: {}", e);
                AnalysisReply::AnalysisError(AnalysisError {
                    message: format!("Invalid analysis request: {}", e),
                })
            }
        };

        if !publisher.send_to(request.session_id, reply.into_event()) {
            debug!(session_id = %request.session_id, "Requesting session left before the reply");
        }
    }

    /// Serve requests until every session handle and the publisher are gone.
    /// Each request runs on its own task so a slow fetch does not hold up others.
    pub async fn serve(self: Arc<Self>, publisher: Arc<RealtimePublisher>, mut requests: mpsc::Receiver<SessionRequest>) {
        while let Some(request) = requests.recv().await {
            let analyzer = Arc::clone(&self);
            let publisher = Arc::clone(&publisher);
            tokio::spawn(async move {
                analyzer.handle(&publisher, request).await;
            });
        }
        debug!("Request channel closed");
    }
}
