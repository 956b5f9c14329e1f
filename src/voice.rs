//! Maps transcribed operator phrases to capture actions. Transcription
//! itself happens elsewhere; this only sees the resulting text.

use crate::capture::{CaptureAction, Modality};
use crate::models::TrialOutcome;

const INCORRECT_WORDS: &[&str] = &["incorrect", "wrong", "no"];
const CORRECT_WORDS: &[&str] = &["correct", "right", "yes"];
const FREQUENCY_WORDS: &[&str] = &["count", "frequency", "increment"];
const START_WORDS: &[&str] = &["start", "begin"];
const STOP_WORDS: &[&str] = &["stop", "end"];

/// Interprets `transcript` against the active modality. Returns `None` for
/// phrases that do not map to an action in that modality.
pub fn interpret(transcript: &str, active: Option<Modality>) -> Option<CaptureAction> {
    let normalized = transcript.to_lowercase();
    let words: Vec<&str> = normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    let has_any = |candidates: &[&str]| words.iter().any(|word| candidates.contains(word));
    let has_phrase = |first: &[&str], second: &str| {
        words
            .windows(2)
            .any(|pair| first.contains(&pair[0]) && pair[1] == second)
    };

    match active {
        Some(Modality::DiscreteTrial) | None => {
            // Negative words win when a phrase carries both.
            if has_any(INCORRECT_WORDS) {
                return Some(trial(TrialOutcome::Incorrect));
            }
            if has_any(CORRECT_WORDS) {
                return Some(trial(TrialOutcome::Correct));
            }
            if active.is_none() && has_any(FREQUENCY_WORDS) {
                return Some(CaptureAction::TickFrequency);
            }
            None
        }
        Some(Modality::Frequency) => has_any(FREQUENCY_WORDS).then_some(CaptureAction::TickFrequency),
        Some(Modality::Duration) => {
            if has_phrase(START_WORDS, "duration") {
                Some(CaptureAction::StartDuration { note: None })
            } else if has_phrase(STOP_WORDS, "duration") {
                Some(CaptureAction::StopDuration)
            } else {
                None
            }
        }
        Some(Modality::TaskAnalysis) | Some(Modality::Abc) => None,
    }
}

fn trial(outcome: TrialOutcome) -> CaptureAction {
    CaptureAction::RecordTrial {
        outcome,
        note: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trial_outcomes_from_phrases() {
        assert_eq!(
            interpret("That's correct!", Some(Modality::DiscreteTrial)),
            Some(trial(TrialOutcome::Correct))
        );
        assert_eq!(
            interpret("Incorrect", Some(Modality::DiscreteTrial)),
            Some(trial(TrialOutcome::Incorrect))
        );
        assert_eq!(
            interpret("no, try again", Some(Modality::DiscreteTrial)),
            Some(trial(TrialOutcome::Incorrect))
        );
    }

    #[test]
    fn words_match_whole_tokens_only() {
        assert_eq!(interpret("nothing to note", Some(Modality::DiscreteTrial)), None);
        assert_eq!(interpret("recount later", Some(Modality::Frequency)), None);
    }

    #[test]
    fn frequency_tick() {
        assert_eq!(
            interpret("Count one", Some(Modality::Frequency)),
            Some(CaptureAction::TickFrequency)
        );
        assert_eq!(interpret("yes", Some(Modality::Frequency)), None);
    }

    #[test]
    fn duration_commands_need_duration_mode() {
        assert_eq!(
            interpret("begin duration", Some(Modality::Duration)),
            Some(CaptureAction::StartDuration { note: None })
        );
        assert_eq!(
            interpret("End duration now", Some(Modality::Duration)),
            Some(CaptureAction::StopDuration)
        );
        assert_eq!(interpret("start duration", Some(Modality::DiscreteTrial)), None);
    }

    #[test]
    fn fresh_session_accepts_trial_and_frequency_words() {
        assert_eq!(interpret("right", None), Some(trial(TrialOutcome::Correct)));
        assert_eq!(interpret("wrong", None), Some(trial(TrialOutcome::Incorrect)));
        assert_eq!(interpret("increment", None), Some(CaptureAction::TickFrequency));
        assert_eq!(interpret("start duration", None), None);
        assert_eq!(interpret("count", Some(Modality::DiscreteTrial)), None);
        assert_eq!(interpret("correct", Some(Modality::Duration)), None);
    }

    #[test]
    fn unknown_phrase_yields_nothing() {
        assert_eq!(interpret("antecedent was a loud noise", Some(Modality::Abc)), None);
        assert_eq!(interpret("", None), None);
    }
}
