use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::connection::Database;
use crate::models::{GoalMetadata, StepTemplate};

fn row_to_goal(row: &Row) -> Result<GoalMetadata> {
    let prompt_options: String = row.get("prompt_options")?;
    let steps: String = row.get("task_analysis_steps")?;

    Ok(GoalMetadata {
        goal_id: row.get("goal_id")?,
        title: row.get("title")?,
        domain: row.get("domain")?,
        prompt_options: serde_json::from_str::<Vec<String>>(&prompt_options)
            .context("failed to parse prompt_options")?,
        task_analysis_steps: serde_json::from_str::<Vec<StepTemplate>>(&steps)
            .context("failed to parse task_analysis_steps")?,
        measurement: row.get("measurement")?,
    })
}

impl Database {
    pub async fn upsert_goal_metadata(&self, goal: &GoalMetadata) -> Result<()> {
        let record = goal.clone();
        let prompt_options = serde_json::to_string(&record.prompt_options)?;
        let steps = serde_json::to_string(&record.task_analysis_steps)?;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO goals (goal_id, title, domain, prompt_options, task_analysis_steps, measurement, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(goal_id) DO UPDATE SET
                     title = excluded.title,
                     domain = excluded.domain,
                     prompt_options = excluded.prompt_options,
                     task_analysis_steps = excluded.task_analysis_steps,
                     measurement = excluded.measurement,
                     updated_at = excluded.updated_at",
                params![
                    record.goal_id,
                    record.title,
                    record.domain,
                    prompt_options,
                    steps,
                    record.measurement,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| format!("failed to save goal {}", record.goal_id))?;
            Ok(())
        })
        .await
    }

    pub async fn get_goal_metadata(&self, goal_id: &str) -> Result<Option<GoalMetadata>> {
        let goal_id = goal_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT goal_id, title, domain, prompt_options, task_analysis_steps, measurement
                 FROM goals
                 WHERE goal_id = ?1",
            )?;

            let goal = stmt
                .query_row(params![goal_id], |row| Ok(row_to_goal(row)))
                .optional()?
                .transpose()?;
            Ok(goal)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn metadata_round_trips_and_updates() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("capture.sqlite3")).unwrap();

        let mut goal = GoalMetadata::new("g1", "Washes hands")
            .with_prompt_options(["Independent", "Verbal"])
            .with_steps(["Turn on water", "Soap", "Rinse"]);
        db.upsert_goal_metadata(&goal).await.unwrap();
        assert_eq!(db.get_goal_metadata("g1").await.unwrap(), Some(goal.clone()));

        goal.measurement = Some("90% independence across 2 consecutive sessions".into());
        db.upsert_goal_metadata(&goal).await.unwrap();
        assert_eq!(db.get_goal_metadata("g1").await.unwrap(), Some(goal));
        assert_eq!(db.get_goal_metadata("g2").await.unwrap(), None);
    }
}
