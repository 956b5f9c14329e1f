use serde::{Deserialize, Serialize};

/// Tunables for progress statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressConfig {
    /// Trials per block in the within-session accuracy trend.
    pub trial_block_size: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            trial_block_size: 3,
        }
    }
}
