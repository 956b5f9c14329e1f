use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use super::{snapshot, CaptureAction, CaptureError, Clock, GoalSessionState};
use crate::{
    db::Database,
    progress::{fold_trend_with, summarize_with, MasteryCriterion, ProgressSummary, TrendMetric, TrendPoint},
    settings::SettingsStore,
    log_error, log_info, log_warn,
};

const ENABLE_LOGS: bool = true;

/// Identifies one open aggregate: a student working on a goal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalKey {
    pub student_id: String,
    pub goal_id: String,
}

impl GoalKey {
    pub fn new(student_id: impl Into<String>, goal_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            goal_id: goal_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MasteryStatus {
    pub metric: TrendMetric,
    pub criterion: MasteryCriterion,
    pub series: Vec<TrendPoint>,
    pub met: bool,
}

/// Owns the live aggregates for one session date. Every action runs under
/// a single lock in call order.
#[derive(Clone)]
pub struct CaptureController {
    sessions: Arc<Mutex<HashMap<GoalKey, GoalSessionState>>>,
    db: Database,
    settings: Arc<SettingsStore>,
    clock: Arc<dyn Clock>,
    session_date: NaiveDate,
}

impl CaptureController {
    pub fn new(
        db: Database,
        settings: Arc<SettingsStore>,
        clock: Arc<dyn Clock>,
        session_date: NaiveDate,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            db,
            settings,
            clock,
            session_date,
        }
    }

    pub fn session_date(&self) -> NaiveDate {
        self.session_date
    }

    /// Returns the aggregate for `student_id`/`goal_id`, resuming an open or
    /// previously saved one for this session date before creating a fresh
    /// one from the goal's metadata.
    pub async fn open_goal(&self, student_id: &str, goal_id: &str) -> Result<GoalSessionState> {
        let key = GoalKey::new(student_id, goal_id);
        let mut sessions = self.sessions.lock().await;
        if let Some(state) = sessions.get(&key) {
            return Ok(state.clone());
        }

        let stored = self
            .db
            .load_historical_sessions(student_id, goal_id)
            .await?
            .into_iter()
            .rev()
            .find(|state| state.session_date() == self.session_date);

        let state = match stored {
            Some(state) => {
                log_info!("Resuming goal {goal_id} for student {student_id} from storage");
                state
            }
            None => {
                let mut metadata = self
                    .db
                    .get_goal_metadata(goal_id)
                    .await?
                    .ok_or_else(|| CaptureError::not_found(format!("unknown goal '{goal_id}'")))?;
                if metadata.prompt_options.is_empty() {
                    metadata.prompt_options = self.settings.capture().default_prompt_options;
                }
                let state = GoalSessionState::create(student_id, &metadata, self.session_date)?;
                log_info!(
                    "Opened goal {goal_id} for student {student_id} as session {}",
                    state.id()
                );
                state
            }
        };

        sessions.insert(key, state.clone());
        Ok(state)
    }

    /// Applies `action` at the clock's current time. A rejected action
    /// leaves the aggregate untouched.
    pub async fn apply(&self, key: &GoalKey, action: CaptureAction) -> Result<GoalSessionState> {
        let mut sessions = self.sessions.lock().await;
        let state = sessions.get_mut(key).ok_or_else(|| not_open(key))?;

        let name = action.name();
        let is_reset = matches!(
            action,
            CaptureAction::ResetFrequency | CaptureAction::ResetDuration | CaptureAction::ResetSession
        );
        if let Err(err) = state.apply(action, self.clock.now()) {
            log_warn!("Rejected {name} for goal {}: {err}", key.goal_id);
            return Err(err.into());
        }
        if is_reset {
            log_info!(
                "Applied {name} to goal {} for student {}",
                key.goal_id,
                key.student_id
            );
        }
        Ok(state.clone())
    }

    pub async fn snapshot(&self, key: &GoalKey) -> Result<Value> {
        let sessions = self.sessions.lock().await;
        let state = sessions.get(key).ok_or_else(|| not_open(key))?;
        Ok(snapshot::serialize(state)?)
    }

    pub async fn summarize(&self, key: &GoalKey) -> Result<ProgressSummary> {
        let config = self.settings.capture().progress_config();
        let sessions = self.sessions.lock().await;
        let state = sessions.get(key).ok_or_else(|| not_open(key))?;
        Ok(summarize_with(state, &config))
    }

    pub async fn save(&self, key: &GoalKey) -> Result<()> {
        let state = {
            let sessions = self.sessions.lock().await;
            sessions.get(key).ok_or_else(|| not_open(key))?.clone()
        };
        self.persist(&state).await
    }

    async fn persist(&self, state: &GoalSessionState) -> Result<()> {
        match self.db.save_goal_session(state, self.clock.now()).await {
            Ok(()) => {
                log_info!("Saved session {} for goal {}", state.id(), state.goal_id());
                Ok(())
            }
            Err(err) => {
                log_error!("Failed to save session {}: {err:#}", state.id());
                Err(err)
            }
        }
    }

    /// Closes any open window or interval at the current time, saves the
    /// result, and drops the aggregate from memory. Nothing is dropped when
    /// finalising or saving fails.
    pub async fn close_goal(&self, key: &GoalKey) -> Result<GoalSessionState> {
        let mut sessions = self.sessions.lock().await;
        let now = self.clock.now();

        let mut closed = sessions.get(key).ok_or_else(|| not_open(key))?.clone();
        closed.finalize_open_capture(now)?;
        self.persist(&closed).await?;

        sessions.remove(key);
        log_info!("Closed goal {} for student {}", key.goal_id, key.student_id);
        Ok(closed)
    }

    /// Trend of `metric` across saved sessions, with the live aggregate
    /// standing in for its own stored copy.
    pub async fn trend(
        &self,
        student_id: &str,
        goal_id: &str,
        metric: TrendMetric,
    ) -> Result<Vec<TrendPoint>> {
        let config = self.settings.capture().progress_config();
        let mut history = self.db.load_historical_sessions(student_id, goal_id).await?;

        let key = GoalKey::new(student_id, goal_id);
        if let Some(live) = self.sessions.lock().await.get(&key) {
            history.retain(|stored| stored.id() != live.id());
            history.push(live.clone());
        }

        Ok(fold_trend_with(&history, metric, &config))
    }

    /// Checks `metric` against `criterion`, falling back to the goal's
    /// measurement text and then to the configured default.
    pub async fn mastery(
        &self,
        student_id: &str,
        goal_id: &str,
        metric: TrendMetric,
        criterion: Option<MasteryCriterion>,
    ) -> Result<MasteryStatus> {
        let criterion = match criterion {
            Some(criterion) => criterion,
            None => self
                .db
                .get_goal_metadata(goal_id)
                .await?
                .and_then(|goal| goal.measurement)
                .and_then(|text| MasteryCriterion::parse(&text))
                .unwrap_or_else(|| self.settings.capture().default_mastery),
        };

        let series = self.trend(student_id, goal_id, metric).await?;
        let met = criterion.is_met(&series);
        Ok(MasteryStatus {
            metric,
            criterion,
            series,
            met,
        })
    }
}

fn not_open(key: &GoalKey) -> CaptureError {
    CaptureError::not_found(format!(
        "goal '{}' is not open for student '{}'",
        key.goal_id, key.student_id
    ))
}
