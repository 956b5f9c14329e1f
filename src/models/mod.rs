pub mod events;
pub mod goal;

pub use events::{
    AbcRecord, DurationRecord, FrequencyEvent, Intensity, OpenDuration, StepStatus,
    TaskAnalysisStep, TrialOutcome, TrialRecord,
};
pub use goal::{GoalMetadata, StepTemplate};
