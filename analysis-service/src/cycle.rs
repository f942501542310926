// Analysis cycle
// One pass over every configured timeframe: fetch -> evaluate -> aggregate,
// then append to the history store and publish to live sessions.

use crate::scheduler::CycleJob;
use async_trait::async_trait;
use chrono::Utc;
use common::{AnalysisCycle, CycleTimeframeResult, TimeframeSpec};
use data_ingestion::{MarketDataSource, RealtimePublisher};
use history_store::HistoryStore;
use signal_generation::{aggregate_timeframe, EvaluationEngine};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct AnalysisCycleRunner {
    name: String,
    source: Arc<dyn MarketDataSource>,
    engine: Arc<EvaluationEngine>,
    store: Arc<HistoryStore>,
    publisher: Arc<RealtimePublisher>,
    timeframes: Vec<TimeframeSpec>,
    max_points: usize,
}

impl AnalysisCycleRunner {
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn MarketDataSource>,
        engine: Arc<EvaluationEngine>,
        store: Arc<HistoryStore>,
        publisher: Arc<RealtimePublisher>,
        timeframes: Vec<TimeframeSpec>,
        max_points: usize,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            engine,
            store,
            publisher,
            timeframes,
            max_points: max_points.max(1),
        }
    }

    /// Run one cycle.
    ///
    /// Timeframes are processed concurrently and reported in configured order.
    /// A timeframe whose fetch fails is left out. Returns `None` when no
    /// timeframe produced a result; nothing is stored or published then.
    /// A failed append is logged and does not stop publication.
    pub async fn run_cycle(&self) -> Option<AnalysisCycle> {
        let timestamp = Utc::now();

        let mut tasks = Vec::with_capacity(self.timeframes.len());
        for timeframe in &self.timeframes {
            let runner = self.name.clone();
            let source = Arc::clone(&self.source);
            let engine = Arc::clone(&self.engine);
            let timeframe = *timeframe;
            let max_points = self.max_points;

            tasks.push(tokio::spawn(async move {
                analyze_timeframe(&runner, source.as_ref(), &engine, &timeframe, max_points).await
            }));
        }

        // Wait for every timeframe, keeping configured order
        let mut results: Vec<CycleTimeframeResult> = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {}
                Err(e) => error!(runner = %self.name, "Timeframe task failed: {}", e),
            }
        }

        if results.is_empty() {
            warn!(runner = %self.name, "No timeframe produced a result, cycle discarded");
            return None;
        }

        let cycle = AnalysisCycle::new(timestamp, results);

        match self.store.append(&cycle.history_entries()).await {
            Ok(outcome) => debug!(
                runner = %self.name,
                appended = outcome.appended,
                duplicates = outcome.duplicates,
                "Cycle stored"
            ),
            Err(e) => error!(runner = %self.name, "Failed to store cycle: {}", e),
        }

        let receivers = self.publisher.publish(&cycle);
        info!(
            runner = %self.name,
            timeframes = cycle.timeframes.len(),
            buy = cycle.overall.buy,
            sell = cycle.overall.sell,
            wait = cycle.overall.wait,
            receivers,
            "Cycle complete"
        );

        Some(cycle)
    }
}

async fn analyze_timeframe(
    runner: &str,
    source: &dyn MarketDataSource,
    engine: &EvaluationEngine,
    timeframe: &TimeframeSpec,
    max_points: usize,
) -> Option<CycleTimeframeResult> {
    let label = timeframe.label();

    let mut series = match source.fetch(timeframe).await {
        Ok(series) => series,
        Err(e) => {
            error!(runner = %runner, timeframe = %label, "Market data fetch failed: {}", e);
            return None;
        }
    };
    series.retain_recent(max_points);

    let evaluation = engine.evaluate(&series);
    let result = aggregate_timeframe(&label, &evaluation, series.last_close());
    debug!(
        timeframe = %label,
        bars = series.len(),
        verdicts = evaluation.verdicts.len(),
        failures = evaluation.failures.len(),
        "Timeframe evaluated"
    );
    Some(result)
}

#[async_trait]
impl CycleJob for AnalysisCycleRunner {
    async fn run(&self) {
        self.run_cycle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Candle, OhlcvSeries, SignalCounts};
    use data_ingestion::{InMemorySource, RealtimeEvent};
    use history_store::StoreConfig;
    use serde_json::json;
    use signal_generation::{Classifier, ClassifierError, ClassifierOutput};

    struct Fixed(&'static str, &'static str);

    impl Classifier for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn evaluate(&self, _series: &OhlcvSeries) -> Result<ClassifierOutput, ClassifierError> {
            Ok(ClassifierOutput::Raw(json!({ "type": self.1 })))
        }
    }

    /// Reports how many bars it was given through its verdict data
    struct BarCounter;

    impl Classifier for BarCounter {
        fn name(&self) -> &str {
            "bar-counter"
        }

        fn evaluate(&self, series: &OhlcvSeries) -> Result<ClassifierOutput, ClassifierError> {
            if series.len() > 10 {
                return Err(ClassifierError::InvalidInput(format!("uncapped series of {}", series.len())));
            }
            Ok(ClassifierOutput::Raw(json!({ "type": "WAIT", "bars": series.len() })))
        }
    }

    fn series(n: usize, last_close: f64) -> OhlcvSeries {
        let candles: Vec<Candle> = (0..n)
            .map(|i| {
                let close = last_close - (n - 1 - i) as f64;
                Candle {
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10.0,
                    timestamp: i as i64 * 60_000,
                }
            })
            .collect();
        OhlcvSeries::from_candles(&candles).unwrap()
    }

    fn store(dir: &std::path::Path) -> Arc<HistoryStore> {
        Arc::new(HistoryStore::new(StoreConfig {
            root: dir.to_path_buf(),
            retry_backoff_ms: 10,
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_failed_fetch_skips_timeframe() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(InMemorySource::new());
        source.insert(TimeframeSpec::minutes(1), series(5, 2000.0)).await;
        source.insert(TimeframeSpec::minutes(15), series(5, 2010.0)).await;

        let engine = Arc::new(
            EvaluationEngine::new()
                .add_classifier(Box::new(Fixed("a", "BUY")))
                .add_classifier(Box::new(Fixed("b", "SELL"))),
        );
        let publisher = Arc::new(RealtimePublisher::new(8));
        let mut session = publisher.connect();
        let store = store(dir.path());

        let runner = AnalysisCycleRunner::new(
            "test",
            source,
            engine,
            store.clone(),
            publisher,
            vec![TimeframeSpec::minutes(1), TimeframeSpec::minutes(5), TimeframeSpec::minutes(15)],
            100,
        );

        let cycle = runner.run_cycle().await.unwrap();
        let labels: Vec<&str> = cycle.timeframes.iter().map(|t| t.timeframe.as_str()).collect();
        assert_eq!(labels, vec!["1m", "15m"]);
        assert_eq!(cycle.timeframes[0].price, Some(2000.0));
        assert_eq!(cycle.timeframes[1].price, Some(2010.0));
        assert_eq!(cycle.overall, SignalCounts::new(2, 2, 0));

        let event = session.try_recv().unwrap();
        assert_eq!(*event, RealtimeEvent::AnalysisUpdate(cycle.clone()));

        let stored = store.read_range(cycle.timestamp, cycle.timestamp).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|e| e.overall == cycle.overall));
    }

    #[tokio::test]
    async fn test_series_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(InMemorySource::new());
        source.insert(TimeframeSpec::minutes(1), series(50, 1500.0)).await;

        let runner = AnalysisCycleRunner::new(
            "capped",
            source,
            Arc::new(EvaluationEngine::new().add_classifier(Box::new(BarCounter))),
            store(dir.path()),
            Arc::new(RealtimePublisher::new(8)),
            vec![TimeframeSpec::minutes(1)],
            10,
        );

        let cycle = runner.run_cycle().await.unwrap();
        assert_eq!(cycle.timeframes[0].signals, SignalCounts::new(0, 0, 1));
        assert_eq!(cycle.timeframes[0].price, Some(1500.0));
    }

    #[tokio::test]
    async fn test_all_fetches_failing_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(RealtimePublisher::new(8));
        let mut session = publisher.connect();
        let store = store(dir.path());

        let runner = AnalysisCycleRunner::new(
            "empty",
            Arc::new(InMemorySource::new()),
            Arc::new(EvaluationEngine::new().add_classifier(Box::new(Fixed("a", "BUY")))),
            store.clone(),
            publisher,
            vec![TimeframeSpec::minutes(1), TimeframeSpec::minutes(5)],
            100,
        );

        assert!(runner.run_cycle().await.is_none());
        assert!(session.try_recv().is_none());
        assert!(store.partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_still_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(InMemorySource::new());
        source.insert(TimeframeSpec::minutes(1), series(5, 2000.0)).await;

        // a plain file where the stream directory should be
        let blocked = dir.path().join("blocked");
        tokio::fs::write(&blocked, b"").await.unwrap();
        let store = Arc::new(HistoryStore::new(StoreConfig {
            root: blocked,
            max_attempts: 1,
            retry_backoff_ms: 1,
            ..Default::default()
        }));

        let publisher = Arc::new(RealtimePublisher::new(8));
        let mut session = publisher.connect();
        let runner = AnalysisCycleRunner::new(
            "unstored",
            source,
            Arc::new(EvaluationEngine::new().add_classifier(Box::new(Fixed("a", "SELL")))),
            store,
            publisher,
            vec![TimeframeSpec::minutes(1)],
            100,
        );

        let cycle = runner.run_cycle().await.unwrap();
        assert_eq!(cycle.overall, SignalCounts::new(0, 1, 0));
        assert!(session.try_recv().is_some());
    }
}
