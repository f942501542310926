//! Service configuration

use common::TimeframeSpec;
use data_ingestion::FinageConfig;
use history_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Top-level configuration, one TOML document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub history: StoreConfig,

    #[serde(default)]
    pub market_data: FinageConfig,

    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Independently cadenced cycle schedulers
    #[serde(default = "default_schedulers")]
    pub schedulers: Vec<SchedulerConfig>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            history: StoreConfig::default(),
            market_data: FinageConfig::default(),
            publisher: PublisherConfig::default(),
            schedulers: default_schedulers(),
        }
    }
}

impl AnalysisConfig {
    /// Parsed `log_level`, falling back to INFO
    pub fn max_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }

    /// Every timeframe label across all schedulers, first occurrence order
    pub fn timeframe_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for label in self.schedulers.iter().flat_map(|s| s.timeframes.iter().map(|tf| tf.label())) {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }

    /// Reject configurations the service cannot run
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.schedulers.is_empty() {
            anyhow::bail!("at least one scheduler must be configured");
        }
        for scheduler in &self.schedulers {
            if scheduler.cadence_secs == 0 {
                anyhow::bail!("scheduler '{}' has a zero cadence", scheduler.name);
            }
            if scheduler.timeframes.is_empty() {
                anyhow::bail!("scheduler '{}' has no timeframes", scheduler.name);
            }
        }
        if self.market_data.max_points == 0 {
            anyhow::bail!("market_data.max_points must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Events buffered per session before a slow session starts losing them
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub name: String,

    /// Seconds between cycle ticks
    pub cadence_secs: u64,

    pub timeframes: Vec<TimeframeSpec>,
}

impl SchedulerConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.cadence_secs)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_channel_capacity() -> usize {
    64
}

fn default_schedulers() -> Vec<SchedulerConfig> {
    vec![
        SchedulerConfig {
            name: "majority".to_string(),
            cadence_secs: 60,
            timeframes: [1, 5, 15, 30].into_iter().map(TimeframeSpec::minutes).collect(),
        },
        SchedulerConfig {
            name: "trading".to_string(),
            cadence_secs: 180,
            timeframes: [1, 5, 15].into_iter().map(TimeframeSpec::minutes).collect(),
        },
    ]
}

/// Load configuration from a TOML file
pub fn load_config(path: &str) -> anyhow::Result<AnalysisConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AnalysisConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to TOML file
pub fn save_config(config: &AnalysisConfig, path: &str) -> anyhow::Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Where the running configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    File,
    Defaults,
}

/// Load `path` if it exists, defaults otherwise, then apply environment overrides.
///
/// Called before logging is set up, so the origin is returned for the caller to report.
pub fn load_or_default(path: &str) -> anyhow::Result<(AnalysisConfig, ConfigOrigin)> {
    let (mut config, origin) = if Path::new(path).exists() {
        (load_config(path)?, ConfigOrigin::File)
    } else {
        (AnalysisConfig::default(), ConfigOrigin::Defaults)
    };

    if let Ok(key) = std::env::var("FINAGE_API_KEY") {
        config.market_data.api_key = key;
    }

    config.validate()?;
    Ok((config, origin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::IntervalUnit;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history.max_attempts, 3);
        assert_eq!(config.history.lock_stale_secs, 300);
        assert_eq!(config.schedulers.len(), 2);
        assert_eq!(config.schedulers[0].cadence(), Duration::from_secs(60));
        assert_eq!(config.timeframe_labels(), vec!["1m", "5m", "15m", "30m"]);
    }

    #[test]
    fn test_parse_toml() {
        let raw = r#"
            log_level = "debug"

            [history]
            root = "/var/lib/analysis"
            stream = "gold"

            [market_data]
            pair = "XAGUSD"

            [[schedulers]]
            name = "hourly"
            cadence_secs = 300
            timeframes = [
                { interval_value = 1, interval_unit = "hour" },
                { interval_value = 15, interval_unit = "minute" },
            ]
        "#;

        let config: AnalysisConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.max_level(), Level::DEBUG);
        assert_eq!(config.history.stream, "gold");
        assert_eq!(config.history.retry_backoff_ms, 1000);
        assert_eq!(config.market_data.pair, "XAGUSD");
        assert_eq!(config.market_data.max_points, 5000);
        assert_eq!(config.publisher.channel_capacity, 64);
        assert_eq!(config.schedulers.len(), 1);
        assert_eq!(config.schedulers[0].timeframes[0].interval_unit(), IntervalUnit::Hour);
        assert_eq!(config.timeframe_labels(), vec!["1h", "15m"]);
    }

    #[test]
    fn test_validate_rejects_zero_cadence() {
        let mut config = AnalysisConfig::default();
        config.schedulers[1].cadence_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.schedulers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.toml");
        let path = path.to_str().unwrap();

        save_config(&AnalysisConfig::default(), path).unwrap();
        let loaded = load_config(path).unwrap();
        assert_eq!(loaded.schedulers.len(), 2);
        assert_eq!(loaded.schedulers[1].name, "trading");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let (config, origin) = load_or_default(path.to_str().unwrap()).unwrap();
        assert_eq!(origin, ConfigOrigin::Defaults);
        assert_eq!(config.schedulers.len(), 2);

        let path = dir.path().join("analysis.toml");
        save_config(&config, path.to_str().unwrap()).unwrap();
        let (_, origin) = load_or_default(path.to_str().unwrap()).unwrap();
        assert_eq!(origin, ConfigOrigin::File);
    }

    #[test]
    fn test_zero_interval_rejected_at_parse() {
        let raw = r#"
            [[schedulers]]
            name = "broken"
            cadence_secs = 60
            timeframes = [{ interval_value = 0, interval_unit = "minute" }]
        "#;

        let err = toml::from_str::<AnalysisConfig>(raw).unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }
}
