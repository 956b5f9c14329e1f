//! Event records appended by the capture operations, one type per modality.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::capture::CaptureError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrialOutcome {
    Correct,
    Incorrect,
}

impl TrialOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrialOutcome::Correct => "correct",
            TrialOutcome::Incorrect => "incorrect",
        }
    }
}

impl FromStr for TrialOutcome {
    type Err = CaptureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "correct" => Ok(TrialOutcome::Correct),
            "incorrect" => Ok(TrialOutcome::Incorrect),
            other => Err(CaptureError::validation(format!(
                "unknown trial outcome '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Independent,
    Prompted,
    NotAttempted,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Independent => "independent",
            StepStatus::Prompted => "prompted",
            StepStatus::NotAttempted => "not_attempted",
        }
    }
}

impl Default for StepStatus {
    fn default() -> Self {
        StepStatus::NotAttempted
    }
}

impl FromStr for StepStatus {
    type Err = CaptureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "independent" => Ok(StepStatus::Independent),
            "prompted" => Ok(StepStatus::Prompted),
            "not_attempted" => Ok(StepStatus::NotAttempted),
            other => Err(CaptureError::validation(format!(
                "unknown step status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Moderate,
    High,
}

impl Intensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Moderate => "moderate",
            Intensity::High => "high",
        }
    }
}

impl FromStr for Intensity {
    type Err = CaptureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Intensity::Low),
            "moderate" => Ok(Intensity::Moderate),
            "high" => Ok(Intensity::High),
            other => Err(CaptureError::validation(format!(
                "unknown intensity '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: TrialOutcome,
    pub prompt_level: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskAnalysisStep {
    pub id: String,
    pub label: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

/// A duration interval that has been started but not yet stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenDuration {
    pub start: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DurationRecord {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub note: Option<String>,
}

impl DurationRecord {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AbcRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub antecedent: String,
    pub behavior: String,
    pub consequence: String,
    pub intensity: Intensity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!("Correct".parse::<TrialOutcome>(), Ok(TrialOutcome::Correct));
        assert_eq!(
            " not_attempted ".parse::<StepStatus>(),
            Ok(StepStatus::NotAttempted)
        );
        assert_eq!("HIGH".parse::<Intensity>(), Ok(Intensity::High));
    }

    #[test]
    fn unknown_labels_are_validation_errors() {
        assert!(matches!(
            "extreme".parse::<Intensity>(),
            Err(CaptureError::Validation(_))
        ));
        assert!(matches!(
            "skipped".parse::<StepStatus>(),
            Err(CaptureError::Validation(_))
        ));
    }

    #[test]
    fn step_status_serializes_snake_case() {
        let json = serde_json::to_string(&StepStatus::NotAttempted).unwrap();
        assert_eq!(json, "\"not_attempted\"");
    }
}
