use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::capture::{GoalSessionState, Modality};
use crate::progress::{
    config::ProgressConfig,
    summary::{summarize_with, ProgressSummary},
};

/// A chartable per-session statistic. Each metric belongs to exactly one
/// modality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TrendMetric {
    Accuracy,
    IndependenceRatio,
    FrequencyRate,
    TotalDurationSecs,
    AverageDurationSecs,
    AbcIncidents,
}

impl TrendMetric {
    pub fn modality(&self) -> Modality {
        match self {
            TrendMetric::Accuracy => Modality::DiscreteTrial,
            TrendMetric::IndependenceRatio => Modality::TaskAnalysis,
            TrendMetric::FrequencyRate => Modality::Frequency,
            TrendMetric::TotalDurationSecs | TrendMetric::AverageDurationSecs => Modality::Duration,
            TrendMetric::AbcIncidents => Modality::Abc,
        }
    }

    /// The metric's value for one session, or `None` when the session has
    /// no data that defines it.
    pub fn value(&self, summary: &ProgressSummary) -> Option<f64> {
        match self {
            TrendMetric::Accuracy => {
                let trials = &summary.discrete_trial;
                (trials.total_attempts > 0).then_some(trials.accuracy)
            }
            TrendMetric::IndependenceRatio => summary.task_analysis.independence_ratio,
            TrendMetric::FrequencyRate => summary.frequency.rate_per_minute,
            TrendMetric::TotalDurationSecs => {
                let duration = &summary.duration;
                (duration.count > 0).then_some(duration.total_secs)
            }
            TrendMetric::AverageDurationSecs => summary.duration.average_secs,
            TrendMetric::AbcIncidents => Some(summary.abc.count as f64),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub session_id: String,
    pub session_date: NaiveDate,
    pub value: f64,
}

pub fn fold_trend(sessions: &[GoalSessionState], metric: TrendMetric) -> Vec<TrendPoint> {
    fold_trend_with(sessions, metric, &ProgressConfig::default())
}

/// Builds a date-ordered series of `metric` across historical sessions.
/// Sessions captured under a different modality, or with no data for the
/// metric, are skipped.
pub fn fold_trend_with(
    sessions: &[GoalSessionState],
    metric: TrendMetric,
    config: &ProgressConfig,
) -> Vec<TrendPoint> {
    let modality = metric.modality();
    let mut points: Vec<TrendPoint> = sessions
        .iter()
        .filter(|session| session.last_mode() == Some(modality))
        .filter_map(|session| {
            let summary = summarize_with(session, config);
            metric.value(&summary).map(|value| TrendPoint {
                session_id: summary.session_id,
                session_date: summary.session_date,
                value,
            })
        })
        .collect();

    points.sort_by_key(|point| point.session_date);
    points
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::models::{GoalMetadata, TrialOutcome};

    fn day(n: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::days(n)
    }

    fn metadata() -> GoalMetadata {
        GoalMetadata::new("goal-8", "Greets peers")
            .with_prompt_options(["Independent", "Verbal"])
            .with_steps(["Look", "Wave"])
    }

    fn trial_session(n: i64, correct: usize, total: usize) -> GoalSessionState {
        let start = day(n);
        let mut state = GoalSessionState::create("s", &metadata(), start.date_naive()).unwrap();
        for i in 0..total {
            let outcome = if i < correct {
                TrialOutcome::Correct
            } else {
                TrialOutcome::Incorrect
            };
            state
                .record_trial(outcome, None, start + Duration::seconds(i as i64))
                .unwrap();
        }
        state
    }

    fn frequency_session(n: i64, ticks: i64) -> GoalSessionState {
        let start = day(n);
        let mut state = GoalSessionState::create("s", &metadata(), start.date_naive()).unwrap();
        state.start_frequency_window(start).unwrap();
        for i in 1..=ticks {
            state.tick_frequency(start + Duration::seconds(i * 10)).unwrap();
        }
        state.close_frequency_window(start + Duration::minutes(1)).unwrap();
        state
    }

    #[test]
    fn alternating_modalities_only_feed_matching_metric() {
        let sessions: Vec<_> = (0..10)
            .map(|n| {
                if n % 2 == 0 {
                    trial_session(n, 4, 5)
                } else {
                    frequency_session(n, 3)
                }
            })
            .collect();

        let accuracy = fold_trend(&sessions, TrendMetric::Accuracy);
        assert_eq!(accuracy.len(), 5);
        assert!(accuracy.iter().all(|p| (p.value - 0.8).abs() < 1e-9));

        let rate = fold_trend(&sessions, TrendMetric::FrequencyRate);
        assert_eq!(rate.len(), 5);
        assert!(rate.iter().all(|p| (p.value - 3.0).abs() < 1e-9));

        assert!(fold_trend(&sessions, TrendMetric::IndependenceRatio).is_empty());
    }

    #[test]
    fn series_is_date_ordered() {
        let sessions = vec![trial_session(3, 1, 2), trial_session(1, 2, 2), trial_session(2, 0, 2)];

        let series = fold_trend(&sessions, TrendMetric::Accuracy);

        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 0.0, 0.5]);
        assert!(series.windows(2).all(|w| w[0].session_date <= w[1].session_date));
    }

    #[test]
    fn sessions_without_data_are_skipped() {
        let mut empty = GoalSessionState::create("s", &metadata(), day(0).date_naive()).unwrap();
        empty.select_mode(Modality::DiscreteTrial, day(0)).unwrap();

        let series = fold_trend(&[empty, trial_session(1, 1, 1)], TrendMetric::Accuracy);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].value, 1.0);
    }
}
