use serde::{Deserialize, Serialize};

/// One step of a task-analysis chain as configured on the goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepTemplate {
    pub id: String,
    pub label: String,
}

/// Fixed configuration a goal contributes to every capture session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalMetadata {
    pub goal_id: String,
    pub title: String,
    pub domain: String,
    /// Ordered from least to most assistance.
    pub prompt_options: Vec<String>,
    pub task_analysis_steps: Vec<StepTemplate>,
    /// Free-text measurement criterion, e.g. "80% accuracy across 3 consecutive sessions".
    #[serde(default)]
    pub measurement: Option<String>,
}

impl GoalMetadata {
    pub fn new(goal_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            goal_id: goal_id.into(),
            title: title.into(),
            domain: String::new(),
            prompt_options: Vec::new(),
            task_analysis_steps: Vec::new(),
            measurement: None,
        }
    }

    pub fn with_prompt_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prompt_options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_steps<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.task_analysis_steps = labels
            .into_iter()
            .enumerate()
            .map(|(idx, label)| StepTemplate {
                id: format!("step-{}", idx + 1),
                label: label.into(),
            })
            .collect();
        self
    }
}
