use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::capture::{snapshot, GoalSessionState, Modality};
use crate::db::{
    connection::Database,
    helpers::{format_date, parse_date, parse_datetime, parse_optional_mode},
};

/// Listing entry for a saved goal session; the capture data itself stays
/// in the serialized `state` column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredSessionInfo {
    pub id: String,
    pub student_id: String,
    pub goal_id: String,
    pub session_date: NaiveDate,
    pub last_mode: Option<Modality>,
    pub updated_at: DateTime<Utc>,
}

fn row_to_state(row: &Row) -> Result<GoalSessionState> {
    let id: String = row.get("id")?;
    let raw: String = row.get("state")?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("goal session {id} holds invalid JSON"))?;
    snapshot::deserialize(value).with_context(|| format!("goal session {id} failed validation"))
}

fn row_to_info(row: &Row) -> Result<StoredSessionInfo> {
    let session_date: String = row.get("session_date")?;
    let last_mode: Option<String> = row.get("last_mode")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(StoredSessionInfo {
        id: row.get("id")?,
        student_id: row.get("student_id")?,
        goal_id: row.get("goal_id")?,
        session_date: parse_date(&session_date, "session_date")?,
        last_mode: parse_optional_mode(last_mode, "last_mode")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// Inserts or replaces the stored copy of `state`.
    pub async fn save_goal_session(
        &self,
        state: &GoalSessionState,
        saved_at: DateTime<Utc>,
    ) -> Result<()> {
        let serialized = serde_json::to_string(&snapshot::serialize(state)?)?;
        let id = state.id().to_string();
        let student_id = state.student_id().to_string();
        let goal_id = state.goal_id().to_string();
        let session_date = format_date(state.session_date());
        let last_mode = state.last_mode().map(|mode| mode.as_str());

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO goal_sessions (id, student_id, goal_id, session_date, last_mode, state, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     last_mode = excluded.last_mode,
                     state = excluded.state,
                     updated_at = excluded.updated_at",
                params![
                    id,
                    student_id,
                    goal_id,
                    session_date,
                    last_mode,
                    serialized,
                    saved_at.to_rfc3339(),
                ],
            )
            .with_context(|| format!("failed to save goal session {id}"))?;
            Ok(())
        })
        .await
    }

    pub async fn get_goal_session(&self, session_id: &str) -> Result<Option<GoalSessionState>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare("SELECT id, state FROM goal_sessions WHERE id = ?1")?;
            let state = stmt
                .query_row(params![session_id], |row| Ok(row_to_state(row)))
                .optional()?
                .transpose()?;
            Ok(state)
        })
        .await
    }

    /// Every saved session for one student and goal, oldest session date
    /// first.
    pub async fn load_historical_sessions(
        &self,
        student_id: &str,
        goal_id: &str,
    ) -> Result<Vec<GoalSessionState>> {
        let student_id = student_id.to_string();
        let goal_id = goal_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, state
                 FROM goal_sessions
                 WHERE student_id = ?1 AND goal_id = ?2
                 ORDER BY session_date ASC, created_at ASC",
            )?;

            let mut rows = stmt.query(params![student_id, goal_id])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_state(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    /// Saved sessions for a student across all goals, newest first.
    pub async fn list_sessions_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<StoredSessionInfo>> {
        let student_id = student_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, student_id, goal_id, session_date, last_mode, updated_at
                 FROM goal_sessions
                 WHERE student_id = ?1
                 ORDER BY session_date DESC, updated_at DESC",
            )?;

            let mut rows = stmt.query(params![student_id])?;
            let mut infos = Vec::new();
            while let Some(row) = rows.next()? {
                infos.push(row_to_info(row)?);
            }
            Ok(infos)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::GoalMetadata;

    fn open_db(dir: &tempfile::TempDir) -> Database {
        Database::new(dir.path().join("capture.sqlite3")).unwrap()
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let goal = GoalMetadata::new("g1", "Requests").with_prompt_options(["Independent"]);
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap();

        let mut state = GoalSessionState::create("s1", &goal, date).unwrap();
        db.save_goal_session(&state, at).await.unwrap();
        state.tick_frequency(at).unwrap();
        db.save_goal_session(&state, at).await.unwrap();

        let history = db.load_historical_sessions("s1", "g1").await.unwrap();
        assert_eq!(history, vec![state.clone()]);

        let infos = db.list_sessions_for_student("s1").await.unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].last_mode, Some(Modality::Frequency));
        assert_eq!(infos[0].session_date, date);
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        assert!(db.get_goal_session("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tampered_state_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        db.execute(|conn| {
            conn.execute(
                "INSERT INTO goal_sessions (id, student_id, goal_id, session_date, last_mode, state, created_at, updated_at)
                 VALUES ('x', 's1', 'g1', '2025-03-04', NULL, '{\"id\": 5}', '', '')",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        assert!(db.get_goal_session("x").await.is_err());
        assert!(db.load_historical_sessions("s1", "g1").await.is_err());
    }
}
