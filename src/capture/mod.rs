pub mod actions;
pub mod clock;
pub mod controller;
pub mod error;
pub mod mode;
pub mod snapshot;
pub mod state;

pub use actions::{reduce, CaptureAction};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{CaptureController, GoalKey, MasteryStatus};
pub use error::{CaptureError, CaptureResult};
pub use mode::Modality;
pub use snapshot::{deserialize, serialize};
pub use state::GoalSessionState;
