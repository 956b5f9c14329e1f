pub mod config;
pub mod mastery;
pub mod summary;
pub mod trend;

pub use config::ProgressConfig;
pub use mastery::MasteryCriterion;
pub use summary::{
    summarize, summarize_with, AbcSummary, DiscreteTrialSummary, DurationSummary,
    FrequencySummary, ProgressBand, ProgressSummary, PromptLevelTally, TaskAnalysisSummary,
};
pub use trend::{fold_trend, fold_trend_with, TrendMetric, TrendPoint};
