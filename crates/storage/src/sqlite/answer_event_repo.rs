use sqlx::Row;
use study_core::model::{EventId, QuizAnswerEvent, UserId};

use super::{
    SqliteStore,
    mapping::{append_err, event_id_from_i64, id_i64, io, map_event_row, ser},
};
use crate::repository::{AnswerEventRepository, StorageError};

#[async_trait::async_trait]
impl AnswerEventRepository for SqliteStore {
    async fn append_event(&self, event: &QuizAnswerEvent) -> Result<EventId, StorageError> {
        let user = id_i64("user_id", event.user_id().value())?;
        let question = id_i64("question_id", event.question_id().value())?;

        // An event that already carries an id keeps it (import path); the
        // primary key rejects replays of stored ids.
        let explicit_id = event
            .id()
            .map(|id| id_i64("event_id", id.value()))
            .transpose()?;

        let res = sqlx::query(
            r"
                INSERT INTO quiz_answer_events (
                    id, user_id, question_id, correct, time_spent_seconds, timestamp
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(explicit_id)
        .bind(user)
        .bind(question)
        .bind(event.correct())
        .bind(i64::from(event.time_spent_seconds()))
        .bind(event.timestamp())
        .execute(&self.pool)
        .await
        .map_err(append_err)?;

        event_id_from_i64(res.last_insert_rowid())
    }

    async fn list_events(&self, user_id: UserId) -> Result<Vec<QuizAnswerEvent>, StorageError> {
        let user = id_i64("user_id", user_id.value())?;

        let rows = sqlx::query(
            r"
                SELECT id, user_id, question_id, correct, time_spent_seconds, timestamp
                FROM quiz_answer_events
                WHERE user_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(io)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(map_event_row(row)?);
        }
        Ok(out)
    }

    async fn count_events(&self, user_id: UserId) -> Result<u64, StorageError> {
        let user = id_i64("user_id", user_id.value())?;

        let row = sqlx::query("SELECT COUNT(*) AS n FROM quiz_answer_events WHERE user_id = ?1")
            .bind(user)
            .fetch_one(&self.pool)
            .await
            .map_err(io)?;

        let n: i64 = row.try_get("n").map_err(ser)?;
        u64::try_from(n).map_err(|_| StorageError::Serialization("negative event count".into()))
    }
}
