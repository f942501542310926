pub mod adhoc;
pub mod config;
pub mod cycle;
pub mod query;
pub mod scheduler;

pub use adhoc::{AdHocAnalyzer, AnalysisError, AnalysisReply, AnalysisRequest, AnalysisResult};
pub use config::{load_config, load_or_default, save_config, AnalysisConfig, ConfigOrigin, PublisherConfig, SchedulerConfig};
pub use cycle::AnalysisCycleRunner;
pub use query::HistoryQuery;
pub use scheduler::{CycleJob, CycleScheduler, SchedulerHandle, SchedulerSnapshot, TickOutcome};
