use std::sync::Arc;

use behavior_capture::{
    voice, CaptureAction, CaptureController, CaptureError, Clock, Database, GoalKey, GoalMetadata,
    ManualClock, MasteryCriterion, Modality, ProgressBand, SettingsStore, StepStatus,
    TrendMetric, TrialOutcome,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

const STUDENT: &str = "student-1";
const GOAL: &str = "goal-requests";

struct Harness {
    _dir: TempDir,
    db: Database,
    settings: Arc<SettingsStore>,
}

impl Harness {
    async fn new(goal: GoalMetadata) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("capture.sqlite3")).unwrap();
        let settings = Arc::new(SettingsStore::new(dir.path().join("settings.json")).unwrap());
        db.upsert_goal_metadata(&goal).await.unwrap();
        Self {
            _dir: dir,
            db,
            settings,
        }
    }

    /// A controller for `day` of March 2025 whose clock starts at 09:00.
    fn controller(&self, day: u32) -> (CaptureController, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap(),
        ));
        let controller = CaptureController::new(
            self.db.clone(),
            self.settings.clone(),
            clock.clone(),
            NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
        );
        (controller, clock)
    }
}

fn goal() -> GoalMetadata {
    GoalMetadata::new(GOAL, "Requests preferred item")
        .with_prompt_options(["Independent", "Verbal", "Physical"])
        .with_steps(["Approach", "Point", "Say item"])
}

fn trial(outcome: TrialOutcome) -> CaptureAction {
    CaptureAction::RecordTrial {
        outcome,
        note: None,
    }
}

fn capture_error(err: &anyhow::Error) -> &CaptureError {
    err.downcast_ref::<CaptureError>()
        .expect("error should carry a CaptureError")
}

#[tokio::test]
async fn discrete_trials_summarize_to_accuracy() {
    let harness = Harness::new(goal()).await;
    let (controller, clock) = harness.controller(3);
    let key = GoalKey::new(STUDENT, GOAL);
    controller.open_goal(STUDENT, GOAL).await.unwrap();

    for outcome in [
        TrialOutcome::Correct,
        TrialOutcome::Correct,
        TrialOutcome::Correct,
        TrialOutcome::Incorrect,
        TrialOutcome::Incorrect,
    ] {
        controller.apply(&key, trial(outcome)).await.unwrap();
        clock.advance(Duration::seconds(10));
    }

    let state = controller.open_goal(STUDENT, GOAL).await.unwrap();
    assert_eq!(state.correct_count(), 3);
    assert_eq!(state.incorrect_count(), 2);
    assert_eq!(state.total_attempts(), 5);

    let summary = controller.summarize(&key).await.unwrap();
    assert!((summary.discrete_trial.accuracy - 0.6).abs() < 1e-9);
    assert_eq!(summary.discrete_trial.band, Some(ProgressBand::Good));
    assert_eq!(summary.active_mode, Some(Modality::DiscreteTrial));
}

#[tokio::test]
async fn duration_interval_round_trip_and_stray_stop() {
    let harness = Harness::new(goal()).await;
    let (controller, clock) = harness.controller(3);
    let key = GoalKey::new(STUDENT, GOAL);
    controller.open_goal(STUDENT, GOAL).await.unwrap();

    let before = controller.snapshot(&key).await.unwrap();
    let err = controller
        .apply(&key, CaptureAction::StopDuration)
        .await
        .unwrap_err();
    assert!(matches!(capture_error(&err), CaptureError::InvalidState(_)));
    assert_eq!(controller.snapshot(&key).await.unwrap(), before);

    let started = clock.now();
    controller
        .apply(&key, CaptureAction::StartDuration { note: None })
        .await
        .unwrap();
    clock.advance(Duration::seconds(45));
    let state = controller
        .apply(&key, CaptureAction::StopDuration)
        .await
        .unwrap();

    assert!(state.duration_current().is_none());
    assert_eq!(state.duration_history().len(), 1);
    let record = &state.duration_history()[0];
    assert_eq!(record.start, started);
    assert_eq!(record.end, started + Duration::seconds(45));
}

#[tokio::test]
async fn switching_mode_closes_open_interval() {
    let harness = Harness::new(goal()).await;
    let (controller, clock) = harness.controller(3);
    let key = GoalKey::new(STUDENT, GOAL);
    controller.open_goal(STUDENT, GOAL).await.unwrap();

    controller
        .apply(&key, CaptureAction::select_mode("duration").unwrap())
        .await
        .unwrap();
    controller
        .apply(&key, CaptureAction::StartDuration { note: None })
        .await
        .unwrap();
    clock.advance(Duration::seconds(30));

    let state = controller
        .apply(&key, CaptureAction::select_mode("frequency").unwrap())
        .await
        .unwrap();
    assert_eq!(state.last_mode(), Some(Modality::Frequency));
    assert!(state.duration_current().is_none());
    assert_eq!(state.duration_history()[0].duration(), Duration::seconds(30));

    let err = controller
        .apply(&key, CaptureAction::StartDuration { note: None })
        .await
        .unwrap_err();
    assert!(matches!(capture_error(&err), CaptureError::InvalidState(_)));
}

#[tokio::test]
async fn unknown_task_step_is_not_found() {
    let harness = Harness::new(goal()).await;
    let (controller, _clock) = harness.controller(3);
    let key = GoalKey::new(STUDENT, GOAL);
    controller.open_goal(STUDENT, GOAL).await.unwrap();

    controller
        .apply(
            &key,
            CaptureAction::SetTaskStepStatus {
                step_id: "step-2".into(),
                status: StepStatus::Independent,
            },
        )
        .await
        .unwrap();
    let before = controller.open_goal(STUDENT, GOAL).await.unwrap();

    let err = controller
        .apply(
            &key,
            CaptureAction::SetTaskStepStatus {
                step_id: "step-99".into(),
                status: StepStatus::Independent,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(capture_error(&err), CaptureError::NotFound(_)));

    let after = controller.open_goal(STUDENT, GOAL).await.unwrap();
    assert_eq!(after.task_steps(), before.task_steps());
    let summary = controller.summarize(&key).await.unwrap();
    assert_eq!(summary.task_analysis.independent, 1);
}

#[tokio::test]
async fn trend_only_uses_matching_modality_sessions() {
    let harness = Harness::new(goal()).await;
    let key = GoalKey::new(STUDENT, GOAL);

    for day in 1..=10 {
        let (controller, clock) = harness.controller(day);
        controller.open_goal(STUDENT, GOAL).await.unwrap();
        if day % 2 == 1 {
            controller
                .apply(&key, trial(TrialOutcome::Correct))
                .await
                .unwrap();
        } else {
            controller
                .apply(&key, CaptureAction::TickFrequency)
                .await
                .unwrap();
            clock.advance(Duration::seconds(60));
        }
        controller.close_goal(&key).await.unwrap();
    }

    let (controller, _clock) = harness.controller(11);
    let accuracy = controller
        .trend(STUDENT, GOAL, TrendMetric::Accuracy)
        .await
        .unwrap();
    let days: Vec<u32> = accuracy
        .iter()
        .map(|point| point.session_date.format("%d").to_string().parse().unwrap())
        .collect();
    assert_eq!(days, vec![1, 3, 5, 7, 9]);
    assert!(accuracy.iter().all(|point| point.value == 1.0));

    let rate = controller
        .trend(STUDENT, GOAL, TrendMetric::FrequencyRate)
        .await
        .unwrap();
    assert_eq!(rate.len(), 5);
    assert!(rate.iter().all(|point| (point.value - 1.0).abs() < 1e-9));

    let durations = controller
        .trend(STUDENT, GOAL, TrendMetric::TotalDurationSecs)
        .await
        .unwrap();
    assert!(durations.is_empty());

    let listed = harness.db.list_sessions_for_student(STUDENT).await.unwrap();
    assert_eq!(listed.len(), 10);
    assert_eq!(listed[0].session_date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
}

#[tokio::test]
async fn mastery_reads_goal_measurement() {
    let mut metadata = goal();
    metadata.measurement = Some("80% accuracy across 3 consecutive sessions".into());
    let harness = Harness::new(metadata).await;
    let key = GoalKey::new(STUDENT, GOAL);

    let daily = [
        [TrialOutcome::Incorrect, TrialOutcome::Incorrect],
        [TrialOutcome::Correct, TrialOutcome::Correct],
        [TrialOutcome::Correct, TrialOutcome::Correct],
    ];
    for (idx, outcomes) in daily.iter().enumerate() {
        let (controller, _clock) = harness.controller(idx as u32 + 1);
        controller.open_goal(STUDENT, GOAL).await.unwrap();
        for outcome in outcomes {
            controller.apply(&key, trial(*outcome)).await.unwrap();
        }
        controller.save(&key).await.unwrap();
    }

    let (controller, _clock) = harness.controller(4);
    let status = controller
        .mastery(STUDENT, GOAL, TrendMetric::Accuracy, None)
        .await
        .unwrap();
    assert_eq!(
        status.criterion,
        MasteryCriterion {
            threshold: 0.8,
            consecutive_sessions: 3
        }
    );
    assert!(!status.met);

    controller.open_goal(STUDENT, GOAL).await.unwrap();
    controller
        .apply(&key, trial(TrialOutcome::Correct))
        .await
        .unwrap();
    let status = controller
        .mastery(STUDENT, GOAL, TrendMetric::Accuracy, None)
        .await
        .unwrap();
    assert_eq!(status.series.len(), 4);
    assert!(status.met);

    let strict = controller
        .mastery(
            STUDENT,
            GOAL,
            TrendMetric::Accuracy,
            Some(MasteryCriterion {
                threshold: 0.9,
                consecutive_sessions: 4,
            }),
        )
        .await
        .unwrap();
    assert!(!strict.met);
}

#[tokio::test]
async fn voice_phrases_drive_the_controller() {
    let harness = Harness::new(goal()).await;
    let (controller, _clock) = harness.controller(3);
    let key = GoalKey::new(STUDENT, GOAL);
    controller.open_goal(STUDENT, GOAL).await.unwrap();

    for phrase in ["yes", "that's right", "wrong one"] {
        let state = controller.open_goal(STUDENT, GOAL).await.unwrap();
        let action = voice::interpret(phrase, state.last_mode()).unwrap();
        controller.apply(&key, action).await.unwrap();
    }

    let state = controller.open_goal(STUDENT, GOAL).await.unwrap();
    assert_eq!(state.correct_count(), 2);
    assert_eq!(state.incorrect_count(), 1);
    assert!(voice::interpret("count", state.last_mode()).is_none());
}
