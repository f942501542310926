use common::TimeframeSpec;
use data_ingestion::{FinageConfig, FinageConnector, MarketDataSource};
use tracing::{error, info};
use tracing_subscriber::fmt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Note: This hits the real Finage API and needs FINAGE_API_KEY set
    // Run with: cargo run --bin test_finage -- 5
    let interval: u32 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(1);
    let timeframe = TimeframeSpec::minutes(interval);

    let config = FinageConfig {
        api_key: std::env::var("FINAGE_API_KEY").unwrap_or_default(),
        ..Default::default()
    };
    let connector = FinageConnector::new(config)?;

    info!("Fetching {} bars from {}...", timeframe, connector.name());

    match connector.fetch(&timeframe).await {
        Ok(series) => {
            info!("✅ Received {} bars", series.len());
            if let (Some(first), Some(last)) = (series.candle(0), series.candle(series.len() - 1)) {
                info!("  First bar: {:?}", first);
                info!("  Last bar:  {:?}", last);
            }
        }
        Err(e) => {
            error!("Fetch failed: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
