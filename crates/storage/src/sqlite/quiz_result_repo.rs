use std::collections::BTreeMap;

use sqlx::Row;
use study_core::model::{Difficulty, QuizResult, SessionId, Tally, Topic, UserId};

use super::{
    SqliteStore,
    mapping::{
        DIMENSION_DIFFICULTY, DIMENSION_TOPIC, difficulty_from_bucket, id_i64, io,
        map_breakdown_row, ser, topic_from_bucket, u32_from_i64, user_id_from_i64,
    },
};
use crate::repository::{QuizResultRepository, StorageError};

async fn breakdowns_for(
    pool: &sqlx::SqlitePool,
    session_id: &str,
) -> Result<(BTreeMap<Topic, Tally>, BTreeMap<Difficulty, Tally>), StorageError> {
    let rows = sqlx::query(
        r"
            SELECT dimension, bucket, total, correct
            FROM quiz_result_breakdowns
            WHERE session_id = ?1
            ORDER BY dimension ASC, bucket ASC
        ",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
    .map_err(io)?;

    let mut topics = BTreeMap::new();
    let mut difficulties = BTreeMap::new();
    for row in &rows {
        let breakdown = map_breakdown_row(row)?;
        match breakdown.dimension.as_str() {
            DIMENSION_TOPIC => {
                topics.insert(topic_from_bucket(&breakdown.bucket)?, breakdown.tally);
            }
            DIMENSION_DIFFICULTY => {
                difficulties.insert(difficulty_from_bucket(&breakdown.bucket)?, breakdown.tally);
            }
            other => {
                return Err(StorageError::Serialization(format!(
                    "invalid breakdown dimension: {other}"
                )));
            }
        }
    }
    Ok((topics, difficulties))
}

async fn map_result_row(
    pool: &sqlx::SqlitePool,
    row: &sqlx::sqlite::SqliteRow,
) -> Result<QuizResult, StorageError> {
    let session_str: String = row.try_get("session_id").map_err(ser)?;
    let session_id: SessionId = session_str.parse().map_err(ser)?;
    let user_id = user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?;

    let total_time: i64 = row.try_get("total_time_seconds").map_err(ser)?;
    let total_time = u64::try_from(total_time)
        .map_err(|_| StorageError::Serialization("total_time_seconds sign overflow".into()))?;

    let (topics, difficulties) = breakdowns_for(pool, &session_str).await?;

    QuizResult::from_persisted(
        session_id,
        user_id,
        row.try_get("completed_at").map_err(ser)?,
        u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        u32_from_i64(
            "correct_answers",
            row.try_get::<i64, _>("correct_answers").map_err(ser)?,
        )?,
        total_time,
        topics,
        difficulties,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl QuizResultRepository for SqliteStore {
    async fn append_result(&self, result: &QuizResult) -> Result<(), StorageError> {
        let session = result.session_id().to_string();
        let user = id_i64("user_id", result.user_id().value())?;
        let total_time = i64::try_from(result.total_time_seconds())
            .map_err(|_| StorageError::Serialization("total_time_seconds overflow".into()))?;

        let mut tx = self.pool.begin().await.map_err(io)?;

        sqlx::query(
            r"
                INSERT INTO quiz_results (
                    session_id, user_id, completed_at, total_questions,
                    correct_answers, total_time_seconds
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(session.as_str())
        .bind(user)
        .bind(result.completed_at())
        .bind(i64::from(result.total_questions()))
        .bind(i64::from(result.correct_answers()))
        .bind(total_time)
        .execute(&mut *tx)
        .await
        .map_err(io)?;

        for (topic, tally) in result.topic_breakdown() {
            insert_breakdown(&mut tx, &session, DIMENSION_TOPIC, topic.as_str(), *tally).await?;
        }
        for (difficulty, tally) in result.difficulty_breakdown() {
            insert_breakdown(
                &mut tx,
                &session,
                DIMENSION_DIFFICULTY,
                difficulty.as_str(),
                *tally,
            )
            .await?;
        }

        tx.commit().await.map_err(io)
    }

    async fn get_result(
        &self,
        session_id: SessionId,
    ) -> Result<Option<QuizResult>, StorageError> {
        let Some(row) = sqlx::query(
            r"
                SELECT session_id, user_id, completed_at, total_questions,
                       correct_answers, total_time_seconds
                FROM quiz_results
                WHERE session_id = ?1
            ",
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(io)?
        else {
            return Ok(None);
        };

        Ok(Some(map_result_row(&self.pool, &row).await?))
    }

    async fn list_results(&self, user_id: UserId) -> Result<Vec<QuizResult>, StorageError> {
        let user = id_i64("user_id", user_id.value())?;

        let rows = sqlx::query(
            r"
                SELECT session_id, user_id, completed_at, total_questions,
                       correct_answers, total_time_seconds
                FROM quiz_results
                WHERE user_id = ?1
                ORDER BY completed_at DESC, session_id DESC
            ",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(io)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(map_result_row(&self.pool, row).await?);
        }
        Ok(out)
    }
}

async fn insert_breakdown(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    session: &str,
    dimension: &str,
    bucket: &str,
    tally: Tally,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
            INSERT INTO quiz_result_breakdowns (
                session_id, dimension, bucket, total, correct
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
        ",
    )
    .bind(session)
    .bind(dimension)
    .bind(bucket)
    .bind(i64::from(tally.total()))
    .bind(i64::from(tally.correct()))
    .execute(&mut **tx)
    .await
    .map_err(io)?;
    Ok(())
}
