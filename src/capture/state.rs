use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CaptureError, CaptureResult, Modality};
use crate::models::{
    AbcRecord, DurationRecord, FrequencyEvent, GoalMetadata, Intensity, OpenDuration,
    StepStatus, TaskAnalysisStep, TrialOutcome, TrialRecord,
};

const ENABLE_LOGS: bool = false;

/// All capture data for one goal within one session.
///
/// Fields are only changed through the capture operations, each of which
/// validates its input completely before touching the aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalSessionState {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) goal_id: String,
    pub(crate) session_date: NaiveDate,
    pub(crate) prompt_options: Vec<String>,
    pub(crate) notes: String,
    pub(crate) trial_history: Vec<TrialRecord>,
    pub(crate) current_prompt: Option<String>,
    pub(crate) total_prompts: u32,
    pub(crate) total_attempts: u32,
    pub(crate) correct_count: u32,
    pub(crate) incorrect_count: u32,
    pub(crate) frequency_count: u32,
    pub(crate) frequency_start: Option<DateTime<Utc>>,
    /// Length of frequency windows already closed, in milliseconds.
    pub(crate) frequency_observed_ms: u64,
    /// End of the most recently closed window. New windows may not start
    /// before it.
    #[serde(default)]
    pub(crate) frequency_last_close: Option<DateTime<Utc>>,
    pub(crate) frequency_history: Vec<FrequencyEvent>,
    pub(crate) duration_current: Option<OpenDuration>,
    pub(crate) duration_history: Vec<DurationRecord>,
    pub(crate) task_steps: Vec<TaskAnalysisStep>,
    pub(crate) abc_entries: Vec<AbcRecord>,
    pub(crate) last_mode: Option<Modality>,
}

impl GoalSessionState {
    /// Builds an empty aggregate for `student_id` working on the goal
    /// described by `metadata`.
    pub fn create(
        student_id: impl Into<String>,
        metadata: &GoalMetadata,
        session_date: NaiveDate,
    ) -> CaptureResult<Self> {
        let mut seen = HashSet::new();
        for step in &metadata.task_analysis_steps {
            if !seen.insert(step.id.as_str()) {
                return Err(CaptureError::validation(format!(
                    "duplicate task-analysis step id '{}'",
                    step.id
                )));
            }
        }

        let mut options_seen = HashSet::new();
        for option in &metadata.prompt_options {
            if option.trim().is_empty() {
                return Err(CaptureError::validation("prompt level labels must not be blank"));
            }
            if !options_seen.insert(option.as_str()) {
                return Err(CaptureError::validation(format!(
                    "duplicate prompt level '{option}'"
                )));
            }
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.into(),
            goal_id: metadata.goal_id.clone(),
            session_date,
            prompt_options: metadata.prompt_options.clone(),
            notes: String::new(),
            trial_history: Vec::new(),
            current_prompt: None,
            total_prompts: 0,
            total_attempts: 0,
            correct_count: 0,
            incorrect_count: 0,
            frequency_count: 0,
            frequency_start: None,
            frequency_observed_ms: 0,
            frequency_last_close: None,
            frequency_history: Vec::new(),
            duration_current: None,
            duration_history: Vec::new(),
            task_steps: metadata
                .task_analysis_steps
                .iter()
                .map(|template| TaskAnalysisStep {
                    id: template.id.clone(),
                    label: template.label.clone(),
                    status: StepStatus::NotAttempted,
                })
                .collect(),
            abc_entries: Vec::new(),
            last_mode: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn goal_id(&self) -> &str {
        &self.goal_id
    }

    pub fn session_date(&self) -> NaiveDate {
        self.session_date
    }

    pub fn prompt_options(&self) -> &[String] {
        &self.prompt_options
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn trial_history(&self) -> &[TrialRecord] {
        &self.trial_history
    }

    pub fn current_prompt(&self) -> Option<&str> {
        self.current_prompt.as_deref()
    }

    pub fn total_prompts(&self) -> u32 {
        self.total_prompts
    }

    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    pub fn incorrect_count(&self) -> u32 {
        self.incorrect_count
    }

    pub fn frequency_count(&self) -> u32 {
        self.frequency_count
    }

    pub fn frequency_start(&self) -> Option<DateTime<Utc>> {
        self.frequency_start
    }

    pub fn frequency_observed_ms(&self) -> u64 {
        self.frequency_observed_ms
    }

    pub fn frequency_last_close(&self) -> Option<DateTime<Utc>> {
        self.frequency_last_close
    }

    pub fn frequency_history(&self) -> &[FrequencyEvent] {
        &self.frequency_history
    }

    pub fn duration_current(&self) -> Option<&OpenDuration> {
        self.duration_current.as_ref()
    }

    pub fn duration_history(&self) -> &[DurationRecord] {
        &self.duration_history
    }

    pub fn task_steps(&self) -> &[TaskAnalysisStep] {
        &self.task_steps
    }

    pub fn abc_entries(&self) -> &[AbcRecord] {
        &self.abc_entries
    }

    pub fn last_mode(&self) -> Option<Modality> {
        self.last_mode
    }

    /// True while a frequency window or duration interval is open.
    pub fn has_open_capture(&self) -> bool {
        self.frequency_start.is_some() || self.duration_current.is_some()
    }

    // ---- discrete trial -------------------------------------------------

    pub fn record_trial(
        &mut self,
        outcome: TrialOutcome,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> CaptureResult<()> {
        self.ensure_routable(Modality::DiscreteTrial)?;
        ensure_not_before_epoch(now)?;
        ensure_not_before(now, self.trial_history.last().map(|t| t.timestamp), "trial")?;

        let prompt_level = self
            .current_prompt
            .clone()
            .or_else(|| self.prompt_options.first().cloned())
            .ok_or_else(|| {
                CaptureError::invalid_state("no prompt level selected and none configured")
            })?;

        self.trial_history.push(TrialRecord {
            id: format!("trial-{}", self.trial_history.len() + 1),
            timestamp: now,
            outcome,
            prompt_level,
            note: normalize_note(note),
        });
        match outcome {
            TrialOutcome::Correct => self.correct_count += 1,
            TrialOutcome::Incorrect => self.incorrect_count += 1,
        }
        self.total_attempts += 1;
        self.adopt_mode(Modality::DiscreteTrial);

        crate::log_debug!(
            "goal {} trial {} ({} / {})",
            self.goal_id,
            outcome.as_str(),
            self.correct_count,
            self.total_attempts
        );
        Ok(())
    }

    pub fn set_prompt_level(&mut self, level: &str) -> CaptureResult<()> {
        self.ensure_routable(Modality::DiscreteTrial)?;
        let Some(option) = self.prompt_options.iter().find(|option| *option == level) else {
            return Err(CaptureError::validation(format!(
                "prompt level '{level}' is not one of the configured options"
            )));
        };

        self.current_prompt = Some(option.clone());
        self.total_prompts += 1;
        self.adopt_mode(Modality::DiscreteTrial);
        Ok(())
    }

    // ---- task analysis --------------------------------------------------

    pub fn set_task_step_status(&mut self, step_id: &str, status: StepStatus) -> CaptureResult<()> {
        self.ensure_routable(Modality::TaskAnalysis)?;
        let step = self
            .task_steps
            .iter_mut()
            .find(|step| step.id == step_id)
            .ok_or_else(|| CaptureError::not_found(format!("task-analysis step '{step_id}'")))?;

        step.status = status;
        self.adopt_mode(Modality::TaskAnalysis);
        Ok(())
    }

    // ---- frequency ------------------------------------------------------

    /// Opens a counting window at `now`. Does nothing if one is already open.
    pub fn start_frequency_window(&mut self, now: DateTime<Utc>) -> CaptureResult<()> {
        self.ensure_routable(Modality::Frequency)?;
        if self.frequency_start.is_some() {
            return Ok(());
        }
        self.check_frequency_open(now)?;

        self.frequency_start = Some(now);
        self.adopt_mode(Modality::Frequency);
        Ok(())
    }

    /// Counts one occurrence, opening a window at `now` first if none is open.
    pub fn tick_frequency(&mut self, now: DateTime<Utc>) -> CaptureResult<()> {
        self.ensure_routable(Modality::Frequency)?;
        match self.frequency_start {
            Some(start) => ensure_not_before(now, Some(start), "frequency window start")?,
            None => self.check_frequency_open(now)?,
        }
        ensure_not_before(
            now,
            self.frequency_history.last().map(|event| event.timestamp),
            "frequency tick",
        )?;

        self.frequency_start.get_or_insert(now);
        self.frequency_history.push(FrequencyEvent {
            id: format!("freq-{}", self.frequency_history.len() + 1),
            timestamp: now,
        });
        self.frequency_count += 1;
        self.adopt_mode(Modality::Frequency);
        Ok(())
    }

    /// Closes the counting window at `now`. Does nothing if none is open.
    pub fn close_frequency_window(&mut self, now: DateTime<Utc>) -> CaptureResult<()> {
        if self.frequency_start.is_none() {
            return Ok(());
        }
        self.check_frequency_close(now)?;
        self.commit_frequency_close(now);
        Ok(())
    }

    pub(crate) fn check_frequency_open(&self, now: DateTime<Utc>) -> CaptureResult<()> {
        ensure_not_before_epoch(now)?;
        ensure_not_before(now, self.frequency_last_close, "frequency window close")?;
        ensure_not_before(
            now,
            self.frequency_history.last().map(|event| event.timestamp),
            "frequency window start",
        )
    }

    pub(crate) fn check_frequency_close(&self, now: DateTime<Utc>) -> CaptureResult<()> {
        ensure_not_before_epoch(now)?;
        ensure_not_before(now, self.frequency_start, "frequency window start")?;
        ensure_not_before(
            now,
            self.frequency_history.last().map(|event| event.timestamp),
            "frequency window close",
        )
    }

    pub(crate) fn commit_frequency_close(&mut self, now: DateTime<Utc>) {
        if let Some(start) = self.frequency_start.take() {
            let window_ms = (now - start).num_milliseconds().max(0) as u64;
            self.frequency_observed_ms = self.frequency_observed_ms.saturating_add(window_ms);
            self.frequency_last_close = Some(now);
        }
    }

    // ---- duration -------------------------------------------------------

    pub fn start_duration(&mut self, note: Option<String>, now: DateTime<Utc>) -> CaptureResult<()> {
        self.ensure_routable(Modality::Duration)?;
        if self.duration_current.is_some() {
            return Err(CaptureError::invalid_state(
                "a duration interval is already running",
            ));
        }
        ensure_not_before_epoch(now)?;
        ensure_not_before(
            now,
            self.duration_history.last().map(|record| record.end),
            "previous duration end",
        )?;

        self.duration_current = Some(OpenDuration {
            start: now,
            note: normalize_note(note),
        });
        self.adopt_mode(Modality::Duration);
        Ok(())
    }

    pub fn stop_duration(&mut self, now: DateTime<Utc>) -> CaptureResult<()> {
        self.ensure_routable(Modality::Duration)?;
        self.check_duration_stop(now)?;
        self.commit_duration_stop(now);
        Ok(())
    }

    pub(crate) fn check_duration_stop(&self, now: DateTime<Utc>) -> CaptureResult<()> {
        let current = self
            .duration_current
            .as_ref()
            .ok_or_else(|| CaptureError::invalid_state("no duration interval is running"))?;
        ensure_not_before_epoch(now)?;
        if now < current.start {
            return Err(CaptureError::validation(format!(
                "duration end {} precedes its start {}",
                now.to_rfc3339(),
                current.start.to_rfc3339()
            )));
        }
        Ok(())
    }

    pub(crate) fn commit_duration_stop(&mut self, now: DateTime<Utc>) {
        if let Some(current) = self.duration_current.take() {
            self.duration_history.push(DurationRecord {
                id: format!("dur-{}", self.duration_history.len() + 1),
                start: current.start,
                end: now,
                note: current.note,
            });
        }
    }

    // ---- abc ------------------------------------------------------------

    pub fn record_abc(
        &mut self,
        antecedent: &str,
        behavior: &str,
        consequence: &str,
        intensity: Intensity,
        now: DateTime<Utc>,
    ) -> CaptureResult<()> {
        self.ensure_routable(Modality::Abc)?;
        let antecedent = required_text(antecedent, "antecedent")?;
        let behavior = required_text(behavior, "behavior")?;
        let consequence = required_text(consequence, "consequence")?;
        ensure_not_before_epoch(now)?;
        ensure_not_before(
            now,
            self.abc_entries.last().map(|entry| entry.timestamp),
            "abc entry",
        )?;

        self.abc_entries.push(AbcRecord {
            id: format!("abc-{}", self.abc_entries.len() + 1),
            timestamp: now,
            antecedent,
            behavior,
            consequence,
            intensity,
        });
        self.adopt_mode(Modality::Abc);
        Ok(())
    }

    // ---- cross-cutting --------------------------------------------------

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    /// Drops frequency ticks, the running count and any open window.
    pub fn reset_frequency(&mut self) {
        self.frequency_count = 0;
        self.frequency_start = None;
        self.frequency_observed_ms = 0;
        self.frequency_last_close = None;
        self.frequency_history.clear();
    }

    /// Drops duration records and any open interval.
    pub fn reset_duration(&mut self) {
        self.duration_current = None;
        self.duration_history.clear();
    }

    /// Clears every log and counter. `last_mode` survives so the operator
    /// lands back on the same capture view.
    pub fn reset_session(&mut self) {
        self.notes.clear();
        self.trial_history.clear();
        self.current_prompt = None;
        self.total_prompts = 0;
        self.total_attempts = 0;
        self.correct_count = 0;
        self.incorrect_count = 0;
        self.reset_frequency();
        self.reset_duration();
        for step in &mut self.task_steps {
            step.status = StepStatus::NotAttempted;
        }
        self.abc_entries.clear();
    }

    /// Checks every structural invariant. Used when accepting an aggregate
    /// from outside, e.g. after deserializing.
    pub fn validate(&self) -> CaptureResult<()> {
        let trials = self.trial_history.len();
        if u64::from(self.correct_count) + u64::from(self.incorrect_count) != trials as u64
            || self.total_attempts as usize != trials
        {
            return Err(CaptureError::validation(format!(
                "trial counters ({} correct, {} incorrect, {} attempts) disagree with {} logged trials",
                self.correct_count, self.incorrect_count, self.total_attempts, trials
            )));
        }
        let correct = self
            .trial_history
            .iter()
            .filter(|trial| trial.outcome == TrialOutcome::Correct)
            .count();
        if correct != self.correct_count as usize {
            return Err(CaptureError::validation(
                "correct count disagrees with logged outcomes",
            ));
        }
        if self.frequency_count as usize != self.frequency_history.len() {
            return Err(CaptureError::validation(
                "frequency count disagrees with logged ticks",
            ));
        }
        if let Some(prompt) = &self.current_prompt {
            if !self.prompt_options.contains(prompt) {
                return Err(CaptureError::validation(format!(
                    "current prompt '{prompt}' is not a configured option"
                )));
            }
        }
        if let (Some(start), Some(last_close)) = (self.frequency_start, self.frequency_last_close) {
            if start < last_close {
                return Err(CaptureError::validation(
                    "open frequency window starts before the previous one closed",
                ));
            }
        }
        if let Some(record) = self.duration_history.iter().find(|r| r.end < r.start) {
            return Err(CaptureError::validation(format!(
                "duration record {} ends before it starts",
                record.id
            )));
        }

        let mut seen = HashSet::new();
        if let Some(step) = self.task_steps.iter().find(|s| !seen.insert(s.id.as_str())) {
            return Err(CaptureError::validation(format!(
                "duplicate task-analysis step id '{}'",
                step.id
            )));
        }

        ensure_ordered(self.trial_history.iter().map(|t| t.timestamp), "trial history")?;
        ensure_ordered(
            self.frequency_history.iter().map(|e| e.timestamp),
            "frequency history",
        )?;
        ensure_ordered(
            self.duration_history
                .iter()
                .flat_map(|r| [r.start, r.end]),
            "duration history",
        )?;
        ensure_ordered(self.abc_entries.iter().map(|e| e.timestamp), "abc entries")?;
        Ok(())
    }
}

fn ensure_not_before_epoch(now: DateTime<Utc>) -> CaptureResult<()> {
    if now.timestamp_millis() < 0 {
        return Err(CaptureError::validation(format!(
            "timestamp {} is negative",
            now.to_rfc3339()
        )));
    }
    Ok(())
}

fn ensure_not_before(
    now: DateTime<Utc>,
    previous: Option<DateTime<Utc>>,
    what: &str,
) -> CaptureResult<()> {
    match previous {
        Some(previous) if now < previous => Err(CaptureError::validation(format!(
            "timestamp {} precedes last {what} at {}",
            now.to_rfc3339(),
            previous.to_rfc3339()
        ))),
        _ => Ok(()),
    }
}

fn ensure_ordered<I>(timestamps: I, what: &str) -> CaptureResult<()>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut previous: Option<DateTime<Utc>> = None;
    for timestamp in timestamps {
        ensure_not_before_epoch(timestamp)?;
        ensure_not_before(timestamp, previous, what)?;
        previous = Some(timestamp);
    }
    Ok(())
}

fn required_text(value: &str, field: &str) -> CaptureResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CaptureError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}
