use sqlx::Row;
use study_core::model::{ProgressRecord, UserId};

use super::{
    SqliteStore,
    mapping::{badge_kind_to_str, id_i64, io, map_badge_row, ser, u32_from_i64},
};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteStore {
    async fn get_progress(&self, user_id: UserId) -> Result<Option<ProgressRecord>, StorageError> {
        let user = id_i64("user_id", user_id.value())?;

        let Some(row) = sqlx::query(
            r"
                SELECT
                    user_id, display_name, total_questions, correct_answers,
                    time_spent_seconds, current_question_index,
                    completed_lessons_count, total_lessons_count, streak_days,
                    last_activity_date, last_login_date
                FROM progress
                WHERE user_id = ?1
            ",
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(io)?
        else {
            return Ok(None);
        };

        let badge_rows = sqlx::query(
            r"
                SELECT badge_id, kind, title, description, earned, earned_date
                FROM badges
                WHERE user_id = ?1
                ORDER BY badge_id ASC
            ",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(io)?;

        let mut badges = Vec::with_capacity(badge_rows.len());
        for badge_row in &badge_rows {
            badges.push(map_badge_row(badge_row)?);
        }

        let time_spent: i64 = row.try_get("time_spent_seconds").map_err(ser)?;
        let time_spent = u64::try_from(time_spent)
            .map_err(|_| StorageError::Serialization("time_spent_seconds sign overflow".into()))?;

        let record = ProgressRecord::from_persisted(
            user_id,
            row.try_get("display_name").map_err(ser)?,
            u32_from_i64(
                "total_questions",
                row.try_get::<i64, _>("total_questions").map_err(ser)?,
            )?,
            u32_from_i64(
                "correct_answers",
                row.try_get::<i64, _>("correct_answers").map_err(ser)?,
            )?,
            time_spent,
            u32_from_i64(
                "current_question_index",
                row.try_get::<i64, _>("current_question_index")
                    .map_err(ser)?,
            )?,
            u32_from_i64(
                "completed_lessons_count",
                row.try_get::<i64, _>("completed_lessons_count")
                    .map_err(ser)?,
            )?,
            u32_from_i64(
                "total_lessons_count",
                row.try_get::<i64, _>("total_lessons_count").map_err(ser)?,
            )?,
            u32_from_i64(
                "streak_days",
                row.try_get::<i64, _>("streak_days").map_err(ser)?,
            )?,
            row.try_get("last_activity_date").map_err(ser)?,
            row.try_get("last_login_date").map_err(ser)?,
            badges,
        )
        .map_err(ser)?;

        Ok(Some(record))
    }

    async fn upsert_progress(&self, progress: &ProgressRecord) -> Result<(), StorageError> {
        let user = id_i64("user_id", progress.user_id().value())?;
        let time_spent = i64::try_from(progress.time_spent_seconds())
            .map_err(|_| StorageError::Serialization("time_spent_seconds overflow".into()))?;

        let mut tx = self.pool.begin().await.map_err(io)?;

        sqlx::query(
            r"
                INSERT INTO progress (
                    user_id, display_name, total_questions, correct_answers,
                    time_spent_seconds, current_question_index,
                    completed_lessons_count, total_lessons_count, streak_days,
                    last_activity_date, last_login_date
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(user_id) DO UPDATE SET
                    display_name = excluded.display_name,
                    total_questions = excluded.total_questions,
                    correct_answers = excluded.correct_answers,
                    time_spent_seconds = excluded.time_spent_seconds,
                    current_question_index = excluded.current_question_index,
                    completed_lessons_count = excluded.completed_lessons_count,
                    total_lessons_count = excluded.total_lessons_count,
                    streak_days = excluded.streak_days,
                    last_activity_date = excluded.last_activity_date,
                    last_login_date = excluded.last_login_date
            ",
        )
        .bind(user)
        .bind(progress.display_name())
        .bind(i64::from(progress.total_questions()))
        .bind(i64::from(progress.correct_answers()))
        .bind(time_spent)
        .bind(i64::from(progress.current_question_index()))
        .bind(i64::from(progress.completed_lessons_count()))
        .bind(i64::from(progress.total_lessons_count()))
        .bind(i64::from(progress.streak_days()))
        .bind(progress.last_activity_date())
        .bind(progress.last_login_date())
        .execute(&mut *tx)
        .await
        .map_err(io)?;

        // Badges are embedded in the record; rewrite them with their owner.
        sqlx::query("DELETE FROM badges WHERE user_id = ?1")
            .bind(user)
            .execute(&mut *tx)
            .await
            .map_err(io)?;

        for badge in progress.badges() {
            sqlx::query(
                r"
                    INSERT INTO badges (
                        user_id, badge_id, kind, title, description, earned, earned_date
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(user)
            .bind(badge.id().as_str())
            .bind(badge_kind_to_str(badge.kind()))
            .bind(badge.title())
            .bind(badge.description())
            .bind(badge.earned())
            .bind(badge.earned_date())
            .execute(&mut *tx)
            .await
            .map_err(io)?;
        }

        tx.commit().await.map_err(io)
    }
}
