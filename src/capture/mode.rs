use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CaptureError, CaptureResult, GoalSessionState};

const ENABLE_LOGS: bool = true;

/// The five data-collection methods. Any modality can switch to any other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Modality {
    DiscreteTrial,
    TaskAnalysis,
    Frequency,
    Duration,
    Abc,
}

impl Modality {
    pub const ALL: [Modality; 5] = [
        Modality::DiscreteTrial,
        Modality::TaskAnalysis,
        Modality::Frequency,
        Modality::Duration,
        Modality::Abc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::DiscreteTrial => "discrete-trial",
            Modality::TaskAnalysis => "task-analysis",
            Modality::Frequency => "frequency",
            Modality::Duration => "duration",
            Modality::Abc => "abc",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = CaptureError;

    /// Accepts the canonical labels plus the ids the goal screens use
    /// (`prompt-levels`, `prompting-levels`, `abc-data`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "discrete-trial" | "prompt-levels" | "prompting-levels" => Ok(Modality::DiscreteTrial),
            "task-analysis" => Ok(Modality::TaskAnalysis),
            "frequency" => Ok(Modality::Frequency),
            "duration" => Ok(Modality::Duration),
            "abc" | "abc-data" => Ok(Modality::Abc),
            other => Err(CaptureError::validation(format!(
                "unknown modality '{other}'"
            ))),
        }
    }
}

impl GoalSessionState {
    /// Switches the active modality. Any open frequency window or duration
    /// interval is finalized at `now` first. Re-selecting the active modality
    /// is a no-op.
    pub fn select_mode(&mut self, mode: Modality, now: DateTime<Utc>) -> CaptureResult<()> {
        if self.last_mode == Some(mode) {
            return Ok(());
        }

        if let Err(err) = self.finalize_open_capture(now) {
            crate::log_warn!("goal {} could not switch to {mode}: {err}", self.goal_id);
            return Err(err);
        }

        if let Some(previous) = self.last_mode {
            crate::log_info!(
                "goal {} switched capture mode {} -> {}",
                self.goal_id,
                previous,
                mode
            );
        }
        self.last_mode = Some(mode);
        Ok(())
    }

    /// Closes whatever timing capture is still open, using `now` as the end
    /// boundary. Both closures are validated before either is applied.
    pub fn finalize_open_capture(&mut self, now: DateTime<Utc>) -> CaptureResult<()> {
        if self.frequency_start.is_some() {
            self.check_frequency_close(now)?;
        }
        if self.duration_current.is_some() {
            self.check_duration_stop(now)?;
        }

        if self.frequency_start.is_some() {
            crate::log_info!("goal {} auto-closing open frequency window", self.goal_id);
            self.commit_frequency_close(now);
        }
        if self.duration_current.is_some() {
            crate::log_info!("goal {} auto-closing open duration interval", self.goal_id);
            self.commit_duration_stop(now);
        }
        Ok(())
    }

    /// Rejects a capture operation that belongs to a modality other than the
    /// active one.
    pub(crate) fn ensure_routable(&self, modality: Modality) -> CaptureResult<()> {
        match self.last_mode {
            Some(active) if active != modality => Err(CaptureError::invalid_state(format!(
                "{modality} capture rejected while {active} is active"
            ))),
            _ => Ok(()),
        }
    }

    /// Adopts `modality` as active when nothing was selected yet.
    pub(crate) fn adopt_mode(&mut self, modality: Modality) {
        self.last_mode.get_or_insert(modality);
    }
}
