use analysis_service::{load_or_default, AdHocAnalyzer, AnalysisCycleRunner, ConfigOrigin, CycleScheduler, HistoryQuery};
use anyhow::Result;
use data_ingestion::{FinageConnector, MarketDataSource, RealtimeEvent, RealtimePublisher};
use history_store::HistoryStore;
use signal_generation::{default_panel, EvaluationEngine};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "analysis.toml".to_string());
    let (config, origin) = load_or_default(&config_path)?;

    // Initialize logging
    fmt().with_max_level(config.max_level()).init();

    info!("Starting analysis service");
    match origin {
        ConfigOrigin::File => info!("Loaded configuration from {}", config_path),
        ConfigOrigin::Defaults => info!("No configuration at {}, using defaults", config_path),
    }
    if config.market_data.api_key.is_empty() {
        warn!("No market data API key configured; fetches will be rejected upstream");
    }

    let store = Arc::new(HistoryStore::new(config.history.clone()));
    let publisher = Arc::new(RealtimePublisher::new(config.publisher.channel_capacity));
    let source: Arc<dyn MarketDataSource> = Arc::new(FinageConnector::new(config.market_data.clone())?);
    let engine = Arc::new(EvaluationEngine::with_panel(default_panel()));
    info!("Classifiers: {}", engine.classifier_names().join(", "));

    let query = HistoryQuery::new(store.clone(), config.timeframe_labels());
    for (label, entries) in query.by_timeframe(None, None).await {
        info!("History for {}: {} entries", label, entries.len());
    }

    // Ad-hoc requests from live sessions
    let analyzer = Arc::new(AdHocAnalyzer::new(
        source.clone(),
        engine.clone(),
        config.market_data.max_points,
    ));
    let server = match publisher.take_requests() {
        Some(requests) => Some(tokio::spawn(analyzer.serve(publisher.clone(), requests))),
        None => {
            warn!("Session requests already taken, ad-hoc analysis disabled");
            None
        }
    };

    // Log every published cycle
    let mut session = publisher.connect();
    let listener = tokio::spawn(async move {
        while let Some(event) = session.recv().await {
            match event.as_ref() {
                RealtimeEvent::AnalysisUpdate(cycle) => {
                    debug!(
                        timestamp = %cycle.timestamp,
                        "Analysis update: BUY {} / SELL {} / WAIT {}",
                        cycle.overall.buy,
                        cycle.overall.sell,
                        cycle.overall.wait
                    );
                }
                RealtimeEvent::AnalysisResult(_) | RealtimeEvent::AnalysisError { .. } => {}
            }
        }
    });

    let mut handles = Vec::new();
    for scheduler in &config.schedulers {
        let runner = AnalysisCycleRunner::new(
            scheduler.name.clone(),
            source.clone(),
            engine.clone(),
            store.clone(),
            publisher.clone(),
            scheduler.timeframes.clone(),
            config.market_data.max_points,
        );
        let labels: Vec<String> = scheduler.timeframes.iter().map(|tf| tf.label()).collect();
        info!(
            "Scheduler {} every {}s over [{}]",
            scheduler.name,
            scheduler.cadence_secs,
            labels.join(", ")
        );
        handles.push(CycleScheduler::new(scheduler.name.clone(), scheduler.cadence(), Arc::new(runner)).spawn());
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    for handle in handles {
        let name = handle.name().to_string();
        let stats = handle.stop().await;
        info!(
            "Scheduler {}: {} cycles started, {} completed, {} ticks skipped",
            name, stats.cycles_started, stats.cycles_completed, stats.ticks_skipped
        );
    }
    listener.abort();
    if let Some(server) = server {
        server.abort();
    }

    info!("Analysis service stopped");
    Ok(())
}
