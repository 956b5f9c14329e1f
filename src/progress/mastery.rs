use serde::{Deserialize, Serialize};

use crate::progress::trend::TrendPoint;

const EPSILON: f64 = 1e-9;

/// "N% across K consecutive sessions".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MasteryCriterion {
    /// Fraction in `[0, 1]`.
    pub threshold: f64,
    pub consecutive_sessions: usize,
}

impl Default for MasteryCriterion {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            consecutive_sessions: 3,
        }
    }
}

impl MasteryCriterion {
    /// Reads goal measurement text such as
    /// "80% accuracy across 3 consecutive sessions". Returns `None` when the
    /// text has no percentage or no consecutive-run length.
    pub fn parse(text: &str) -> Option<Self> {
        let tokens: Vec<&str> = text.split_whitespace().collect();

        let percent = tokens.iter().find_map(|token| {
            let trimmed = token.trim_end_matches(|c: char| c == ',' || c == '.');
            trimmed.strip_suffix('%')?.parse::<f64>().ok()
        })?;
        if !(0.0..=100.0).contains(&percent) {
            return None;
        }

        let consecutive_sessions = tokens.windows(2).find_map(|pair| {
            if pair[1].eq_ignore_ascii_case("consecutive") {
                pair[0].parse::<usize>().ok()
            } else {
                None
            }
        })?;
        if consecutive_sessions == 0 {
            return None;
        }

        Some(Self {
            threshold: percent / 100.0,
            consecutive_sessions,
        })
    }

    /// True when the most recent `consecutive_sessions` points all reach the
    /// threshold.
    pub fn is_met(&self, series: &[TrendPoint]) -> bool {
        if self.consecutive_sessions == 0 || series.len() < self.consecutive_sessions {
            return false;
        }
        series[series.len() - self.consecutive_sessions..]
            .iter()
            .all(|point| point.value + EPSILON >= self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn series(values: &[f64]) -> Vec<TrendPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| TrendPoint {
                session_id: format!("s{i}"),
                session_date: NaiveDate::from_ymd_opt(2024, 3, 1 + i as u32).unwrap(),
                value: *value,
            })
            .collect()
    }

    #[test]
    fn parses_goal_measurement_text() {
        assert_eq!(
            MasteryCriterion::parse("80% accuracy across 3 consecutive sessions"),
            Some(MasteryCriterion {
                threshold: 0.8,
                consecutive_sessions: 3,
            })
        );
        assert_eq!(
            MasteryCriterion::parse("75% accuracy across 4 consecutive sessions")
                .map(|c| c.consecutive_sessions),
            Some(4)
        );
    }

    #[test]
    fn count_based_measurement_has_no_criterion() {
        assert!(MasteryCriterion::parse("3 times per day across 5 consecutive days").is_none());
        assert!(MasteryCriterion::parse("80% accuracy").is_none());
    }

    #[test]
    fn requires_the_latest_run_to_meet_threshold() {
        let criterion = MasteryCriterion::default();
        assert!(criterion.is_met(&series(&[0.4, 0.8, 0.9, 1.0])));
        assert!(!criterion.is_met(&series(&[0.9, 0.9, 0.7, 0.9])));
        assert!(!criterion.is_met(&series(&[0.9, 0.9])));
    }
}
