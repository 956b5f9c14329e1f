//! Plain-data handoff between the live aggregate and persistence.

use serde_json::Value;

use super::{CaptureError, CaptureResult, GoalSessionState};

pub fn serialize(state: &GoalSessionState) -> CaptureResult<Value> {
    serde_json::to_value(state)
        .map_err(|err| CaptureError::validation(format!("failed to serialize session: {err}")))
}

/// Rebuilds an aggregate and checks its invariants, so a hand-edited or
/// corrupt record is rejected instead of becoming live state.
pub fn deserialize(value: Value) -> CaptureResult<GoalSessionState> {
    let state: GoalSessionState = serde_json::from_value(value)
        .map_err(|err| CaptureError::validation(format!("malformed session record: {err}")))?;
    state.validate()?;
    Ok(state)
}
