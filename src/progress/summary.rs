use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::capture::{GoalSessionState, Modality};
use crate::models::{Intensity, StepStatus, TrialOutcome};
use crate::progress::config::ProgressConfig;

/// Verbal rating attached to an accuracy figure in reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProgressBand {
    Excellent,
    Good,
    Moderate,
    NeedsImprovement,
}

impl ProgressBand {
    /// `accuracy` is a fraction in `[0, 1]`.
    pub fn from_accuracy(accuracy: f64) -> Self {
        let percent = (accuracy * 100.0).round();
        if percent >= 80.0 {
            ProgressBand::Excellent
        } else if percent >= 60.0 {
            ProgressBand::Good
        } else if percent >= 40.0 {
            ProgressBand::Moderate
        } else {
            ProgressBand::NeedsImprovement
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProgressBand::Excellent => "Excellent",
            ProgressBand::Good => "Good",
            ProgressBand::Moderate => "Moderate",
            ProgressBand::NeedsImprovement => "Needs Improvement",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptLevelTally {
    pub level: String,
    pub attempts: u32,
    pub correct: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscreteTrialSummary {
    pub total_attempts: u32,
    pub correct: u32,
    pub incorrect: u32,
    /// 0 when no trials were run.
    pub accuracy: f64,
    /// Accuracy per consecutive block of trials; the last block may be short.
    pub block_trend: Vec<f64>,
    pub band: Option<ProgressBand>,
    /// In the order the prompt levels are configured; unused levels omitted.
    pub by_prompt_level: Vec<PromptLevelTally>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskAnalysisSummary {
    pub total_steps: usize,
    pub independent: usize,
    pub prompted: usize,
    pub not_attempted: usize,
    /// `None` for a goal without steps.
    pub independence_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrequencySummary {
    pub count: u32,
    pub observed_ms: u64,
    /// Occurrences per minute of observed time; `None` when nothing was observed.
    pub rate_per_minute: Option<f64>,
    pub window_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DurationSummary {
    pub count: usize,
    pub total_secs: f64,
    pub average_secs: Option<f64>,
    pub in_progress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AbcSummary {
    pub count: usize,
    pub low: usize,
    pub moderate: usize,
    pub high: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub session_id: String,
    pub goal_id: String,
    pub session_date: NaiveDate,
    pub active_mode: Option<Modality>,
    pub discrete_trial: DiscreteTrialSummary,
    pub task_analysis: TaskAnalysisSummary,
    pub frequency: FrequencySummary,
    pub duration: DurationSummary,
    pub abc: AbcSummary,
}

pub fn summarize(state: &GoalSessionState) -> ProgressSummary {
    summarize_with(state, &ProgressConfig::default())
}

/// Derives statistics without touching the aggregate; safe mid-capture.
pub fn summarize_with(state: &GoalSessionState, config: &ProgressConfig) -> ProgressSummary {
    ProgressSummary {
        session_id: state.id().to_string(),
        goal_id: state.goal_id().to_string(),
        session_date: state.session_date(),
        active_mode: state.last_mode(),
        discrete_trial: summarize_trials(state, config),
        task_analysis: summarize_steps(state),
        frequency: summarize_frequency(state),
        duration: summarize_durations(state),
        abc: summarize_abc(state),
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

fn summarize_trials(state: &GoalSessionState, config: &ProgressConfig) -> DiscreteTrialSummary {
    let history = state.trial_history();
    let accuracy = ratio(state.correct_count() as usize, state.total_attempts() as usize);

    let block_size = config.trial_block_size.max(1);
    let block_trend = history
        .chunks(block_size)
        .filter_map(|block| {
            let correct = block
                .iter()
                .filter(|trial| trial.outcome == TrialOutcome::Correct)
                .count();
            ratio(correct, block.len())
        })
        .collect();

    let by_prompt_level = state
        .prompt_options()
        .iter()
        .filter_map(|level| {
            let (attempts, correct) = history
                .iter()
                .filter(|trial| &trial.prompt_level == level)
                .fold((0u32, 0u32), |(attempts, correct), trial| {
                    let hit = u32::from(trial.outcome == TrialOutcome::Correct);
                    (attempts + 1, correct + hit)
                });
            (attempts > 0).then(|| PromptLevelTally {
                level: level.clone(),
                attempts,
                correct,
            })
        })
        .collect();

    DiscreteTrialSummary {
        total_attempts: state.total_attempts(),
        correct: state.correct_count(),
        incorrect: state.incorrect_count(),
        accuracy: accuracy.unwrap_or(0.0),
        block_trend,
        band: accuracy.map(ProgressBand::from_accuracy),
        by_prompt_level,
    }
}

fn summarize_steps(state: &GoalSessionState) -> TaskAnalysisSummary {
    let steps = state.task_steps();
    let count = |status: StepStatus| steps.iter().filter(|s| s.status == status).count();
    let independent = count(StepStatus::Independent);

    TaskAnalysisSummary {
        total_steps: steps.len(),
        independent,
        prompted: count(StepStatus::Prompted),
        not_attempted: count(StepStatus::NotAttempted),
        independence_ratio: ratio(independent, steps.len()),
    }
}

fn summarize_frequency(state: &GoalSessionState) -> FrequencySummary {
    let open_ms = match (state.frequency_start(), state.frequency_history().last()) {
        (Some(start), Some(last)) if last.timestamp >= start => {
            (last.timestamp - start).num_milliseconds().max(0) as u64
        }
        _ => 0,
    };
    let observed_ms = state.frequency_observed_ms().saturating_add(open_ms);

    let rate_per_minute = if observed_ms == 0 {
        None
    } else {
        Some(state.frequency_count() as f64 / (observed_ms as f64 / 60_000.0))
    };

    FrequencySummary {
        count: state.frequency_count(),
        observed_ms,
        rate_per_minute,
        window_open: state.frequency_start().is_some(),
    }
}

fn summarize_durations(state: &GoalSessionState) -> DurationSummary {
    let records = state.duration_history();
    let total_ms: i64 = records
        .iter()
        .map(|record| record.duration().num_milliseconds().max(0))
        .sum();
    let total_secs = total_ms as f64 / 1000.0;

    DurationSummary {
        count: records.len(),
        total_secs,
        average_secs: (!records.is_empty()).then(|| total_secs / records.len() as f64),
        in_progress: state.duration_current().is_some(),
    }
}

fn summarize_abc(state: &GoalSessionState) -> AbcSummary {
    let entries = state.abc_entries();
    let count = |level: Intensity| entries.iter().filter(|e| e.intensity == level).count();

    AbcSummary {
        count: entries.len(),
        low: count(Intensity::Low),
        moderate: count(Intensity::Moderate),
        high: count(Intensity::High),
    }
}
