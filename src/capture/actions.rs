use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CaptureResult, GoalSessionState, Modality};
use crate::models::{Intensity, StepStatus, TrialOutcome};

/// One operator action against a goal's capture state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CaptureAction {
    SelectMode {
        mode: Modality,
    },
    RecordTrial {
        outcome: TrialOutcome,
        #[serde(default)]
        note: Option<String>,
    },
    SetPromptLevel {
        level: String,
    },
    SetTaskStepStatus {
        step_id: String,
        status: StepStatus,
    },
    StartFrequencyWindow,
    TickFrequency,
    CloseFrequencyWindow,
    StartDuration {
        #[serde(default)]
        note: Option<String>,
    },
    StopDuration,
    RecordAbc {
        antecedent: String,
        behavior: String,
        consequence: String,
        intensity: Intensity,
    },
    SetNotes {
        notes: String,
    },
    ResetFrequency,
    ResetDuration,
    /// Irreversible; the caller confirms with the operator before sending it.
    ResetSession,
}

impl CaptureAction {
    /// Parses a modality label into a `SelectMode` action.
    pub fn select_mode(label: &str) -> CaptureResult<Self> {
        Ok(CaptureAction::SelectMode {
            mode: label.parse()?,
        })
    }

    /// The modality whose log this action writes to, if any.
    pub fn modality(&self) -> Option<Modality> {
        match self {
            CaptureAction::RecordTrial { .. } | CaptureAction::SetPromptLevel { .. } => {
                Some(Modality::DiscreteTrial)
            }
            CaptureAction::SetTaskStepStatus { .. } => Some(Modality::TaskAnalysis),
            CaptureAction::StartFrequencyWindow
            | CaptureAction::TickFrequency
            | CaptureAction::CloseFrequencyWindow => Some(Modality::Frequency),
            CaptureAction::StartDuration { .. } | CaptureAction::StopDuration => {
                Some(Modality::Duration)
            }
            CaptureAction::RecordAbc { .. } => Some(Modality::Abc),
            CaptureAction::SelectMode { .. }
            | CaptureAction::SetNotes { .. }
            | CaptureAction::ResetFrequency
            | CaptureAction::ResetDuration
            | CaptureAction::ResetSession => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CaptureAction::SelectMode { .. } => "selectMode",
            CaptureAction::RecordTrial { .. } => "recordTrial",
            CaptureAction::SetPromptLevel { .. } => "setPromptLevel",
            CaptureAction::SetTaskStepStatus { .. } => "setTaskStepStatus",
            CaptureAction::StartFrequencyWindow => "startFrequencyWindow",
            CaptureAction::TickFrequency => "tickFrequency",
            CaptureAction::CloseFrequencyWindow => "closeFrequencyWindow",
            CaptureAction::StartDuration { .. } => "startDuration",
            CaptureAction::StopDuration => "stopDuration",
            CaptureAction::RecordAbc { .. } => "recordAbc",
            CaptureAction::SetNotes { .. } => "setNotes",
            CaptureAction::ResetFrequency => "resetFrequency",
            CaptureAction::ResetDuration => "resetDuration",
            CaptureAction::ResetSession => "resetSession",
        }
    }
}

impl GoalSessionState {
    /// Routes `action` to its capture operation. On error the aggregate is
    /// unchanged.
    pub fn apply(&mut self, action: CaptureAction, now: DateTime<Utc>) -> CaptureResult<()> {
        match action {
            CaptureAction::SelectMode { mode } => self.select_mode(mode, now),
            CaptureAction::RecordTrial { outcome, note } => self.record_trial(outcome, note, now),
            CaptureAction::SetPromptLevel { level } => self.set_prompt_level(&level),
            CaptureAction::SetTaskStepStatus { step_id, status } => {
                self.set_task_step_status(&step_id, status)
            }
            CaptureAction::StartFrequencyWindow => self.start_frequency_window(now),
            CaptureAction::TickFrequency => self.tick_frequency(now),
            CaptureAction::CloseFrequencyWindow => self.close_frequency_window(now),
            CaptureAction::StartDuration { note } => self.start_duration(note, now),
            CaptureAction::StopDuration => self.stop_duration(now),
            CaptureAction::RecordAbc {
                antecedent,
                behavior,
                consequence,
                intensity,
            } => self.record_abc(&antecedent, &behavior, &consequence, intensity, now),
            CaptureAction::SetNotes { notes } => {
                self.set_notes(notes);
                Ok(())
            }
            CaptureAction::ResetFrequency => {
                self.reset_frequency();
                Ok(())
            }
            CaptureAction::ResetDuration => {
                self.reset_duration();
                Ok(())
            }
            CaptureAction::ResetSession => {
                self.reset_session();
                Ok(())
            }
        }
    }
}

/// Pure form of [`GoalSessionState::apply`]: returns the next state and
/// leaves `state` untouched.
pub fn reduce(
    state: &GoalSessionState,
    action: CaptureAction,
    now: DateTime<Utc>,
) -> CaptureResult<GoalSessionState> {
    let mut next = state.clone();
    next.apply(action, now)?;
    Ok(next)
}
