pub mod capture;
pub mod db;
pub mod models;
pub mod progress;
pub mod settings;
pub mod utils;
pub mod voice;

use std::{path::Path, sync::Arc};

use anyhow::Result;
use chrono::{NaiveDate, Utc};

pub use capture::{
    deserialize, reduce, serialize, CaptureAction, CaptureController, CaptureError,
    CaptureResult, Clock, GoalKey, GoalSessionState, ManualClock, MasteryStatus, Modality,
    SystemClock,
};
pub use db::{Database, StoredSessionInfo};
pub use models::{
    AbcRecord, DurationRecord, FrequencyEvent, GoalMetadata, Intensity, OpenDuration,
    StepStatus, StepTemplate, TaskAnalysisStep, TrialOutcome, TrialRecord,
};
pub use progress::{
    fold_trend, summarize, MasteryCriterion, ProgressBand, ProgressConfig, ProgressSummary,
    TrendMetric, TrendPoint,
};
pub use settings::{CaptureSettings, SettingsStore};

/// Installs the global logger. Reads `RUST_LOG`, defaulting to `info`.
/// Calling it more than once is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

pub fn create_session(
    student_id: impl Into<String>,
    metadata: &GoalMetadata,
    session_date: NaiveDate,
) -> CaptureResult<GoalSessionState> {
    GoalSessionState::create(student_id, metadata, session_date)
}

/// Opens the database and settings under `data_dir` and returns a controller
/// for today's sessions on the system clock.
pub fn open_controller(data_dir: &Path) -> Result<CaptureController> {
    std::fs::create_dir_all(data_dir)?;

    let database = Database::new(data_dir.join("capture.sqlite3"))?;
    let settings = Arc::new(SettingsStore::new(data_dir.join("settings.json"))?);
    let session_date = Utc::now().date_naive();
    log::info!("Capture controller ready for {session_date}");

    Ok(CaptureController::new(
        database,
        settings,
        Arc::new(SystemClock),
        session_date,
    ))
}
