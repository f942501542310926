use analysis_service::{AnalysisCycleRunner, CycleScheduler, HistoryQuery};
use chrono::Datelike;
use common::{Candle, OhlcvSeries, SignalCounts, TimeframeSpec};
use data_ingestion::{InMemorySource, RealtimeEvent, RealtimePublisher};
use history_store::{HistoryStore, StoreConfig};
use serde_json::json;
use signal_generation::{default_panel, Classifier, ClassifierError, ClassifierOutput, EvaluationEngine};
use std::sync::Arc;
use std::time::Duration;

struct Fixed(&'static str, serde_json::Value);

impl Classifier for Fixed {
    fn name(&self) -> &str {
        self.0
    }

    fn evaluate(&self, _series: &OhlcvSeries) -> Result<ClassifierOutput, ClassifierError> {
        Ok(ClassifierOutput::Raw(self.1.clone()))
    }
}

struct Throws;

impl Classifier for Throws {
    fn name(&self) -> &str {
        "throws"
    }

    fn evaluate(&self, _series: &OhlcvSeries) -> Result<ClassifierOutput, ClassifierError> {
        panic!("indicator blew up")
    }
}

fn wave(n: usize, base: f64) -> OhlcvSeries {
    let candles: Vec<Candle> = (0..n)
        .map(|i| {
            let close = base + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.05;
            Candle {
                open: close - 0.2,
                high: close + 0.8,
                low: close - 0.8,
                close,
                volume: 1000.0,
                timestamp: 1_700_000_000_000 + i as i64 * 60_000,
            }
        })
        .collect();
    OhlcvSeries::from_candles(&candles).unwrap()
}

fn store_at(root: &std::path::Path) -> Arc<HistoryStore> {
    Arc::new(HistoryStore::new(StoreConfig {
        root: root.to_path_buf(),
        max_attempts: 20,
        retry_backoff_ms: 5,
        ..Default::default()
    }))
}

#[tokio::test]
async fn failing_classifier_is_excluded_from_counts() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(InMemorySource::new());
    source.insert(TimeframeSpec::minutes(1), wave(120, 2000.0)).await;
    source.insert(TimeframeSpec::minutes(5), wave(120, 2005.0)).await;

    let engine = EvaluationEngine::new()
        .add_classifier(Box::new(Fixed("top-level", json!({"type": "BUY"}))))
        .add_classifier(Box::new(Fixed("nested", json!({"signal": {"type": "SELL"}}))))
        .add_classifier(Box::new(Fixed("exit", json!({"type": "EXIT"}))))
        .add_classifier(Box::new(Fixed("untyped", json!({"reason": "flat"}))))
        .add_classifier(Box::new(Throws));

    let store = store_at(dir.path());
    let publisher = Arc::new(RealtimePublisher::new(8));
    let runner = AnalysisCycleRunner::new(
        "majority",
        source,
        Arc::new(engine),
        store.clone(),
        publisher,
        vec![TimeframeSpec::minutes(1), TimeframeSpec::minutes(5)],
        5000,
    );

    let cycle = runner.run_cycle().await.unwrap();
    for tf in &cycle.timeframes {
        assert_eq!(tf.signals, SignalCounts::new(1, 1, 2));
        assert_eq!(tf.signals.total(), 4);
    }
    assert_eq!(cycle.overall, SignalCounts::new(2, 2, 4));

    let query = HistoryQuery::new(store, vec!["1m".into(), "5m".into()]);
    let history = query.by_timeframe(None, None).await;
    assert_eq!(history["1m"].len(), 1);
    assert_eq!(history["5m"].len(), 1);
    assert_eq!(history["1m"][0].overall, cycle.overall);
}

#[tokio::test]
async fn late_session_recovers_from_history() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(InMemorySource::new());
    source.insert(TimeframeSpec::minutes(15), wave(200, 1990.0)).await;

    let store = store_at(dir.path());
    let publisher = Arc::new(RealtimePublisher::new(8));
    let mut early = publisher.connect();

    let runner = AnalysisCycleRunner::new(
        "majority",
        source,
        Arc::new(EvaluationEngine::with_panel(default_panel())),
        store.clone(),
        publisher.clone(),
        vec![TimeframeSpec::minutes(15)],
        5000,
    );
    let cycle = runner.run_cycle().await.unwrap();
    assert!(cycle.overall.total() as usize <= 5);

    let mut late = publisher.connect();
    assert!(late.try_recv().is_none());

    match early.try_recv().as_deref() {
        Some(RealtimeEvent::AnalysisUpdate(published)) => assert_eq!(published, &cycle),
        other => panic!("expected analysis update, got {:?}", other),
    }

    let month = HistoryQuery::new(store, vec!["15m".into()])
        .month(cycle.timestamp.year(), cycle.timestamp.month())
        .await;
    assert_eq!(month.len(), 1);
    assert_eq!(month[0].id, format!("{}-15m", common::timestamp::format_millis(&cycle.timestamp)));
}

#[tokio::test]
async fn uncoordinated_schedulers_share_one_stream() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(InMemorySource::new());
    for minutes in [1, 5, 15, 30] {
        source.insert(TimeframeSpec::minutes(minutes), wave(100, 2000.0)).await;
    }
    let engine = Arc::new(EvaluationEngine::new().add_classifier(Box::new(Fixed("buy", json!({"type": "BUY"})))));
    let publisher = Arc::new(RealtimePublisher::new(64));

    // each scheduler gets its own store value, as separate processes would
    let majority = AnalysisCycleRunner::new(
        "majority",
        source.clone(),
        engine.clone(),
        store_at(dir.path()),
        publisher.clone(),
        [1, 5, 15, 30].into_iter().map(TimeframeSpec::minutes).collect(),
        5000,
    );
    let trading = AnalysisCycleRunner::new(
        "trading",
        source,
        engine,
        store_at(dir.path()),
        publisher,
        [1, 5, 15].into_iter().map(TimeframeSpec::minutes).collect(),
        5000,
    );

    let a = CycleScheduler::new("majority", Duration::from_millis(30), Arc::new(majority)).spawn();
    let b = CycleScheduler::new("trading", Duration::from_millis(45), Arc::new(trading)).spawn();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let a_stats = a.stop().await;
    let b_stats = b.stop().await;
    for stats in [a_stats, b_stats] {
        assert_eq!(stats.cycles_completed, stats.cycles_started);
    }
    assert!(!dir.path().join("majority").join(".lock").exists());

    let reader = store_at(dir.path());
    let entries = reader
        .read_range(chrono::DateTime::<chrono::Utc>::default(), chrono::Utc::now())
        .await
        .unwrap();

    let mut ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total, "ids must be unique");
    assert!(a_stats.cycles_started >= 2 && b_stats.cycles_started >= 2);
    assert!(total >= 4 + 3);
}
