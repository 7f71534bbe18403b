use sqlx::Row;
use study_core::model::{LessonId, LessonProgress, SlideProgress, UserId};

use super::{
    SqliteStore,
    mapping::{id_i64, io, lesson_id_from_i64, map_slide_row, ser},
};
use crate::repository::{LessonProgressRepository, StorageError};

async fn slides_for(
    pool: &sqlx::SqlitePool,
    user: i64,
    lesson: i64,
) -> Result<Vec<SlideProgress>, StorageError> {
    let rows = sqlx::query(
        r"
            SELECT slide_id, viewed, time_spent_seconds
            FROM slide_progress
            WHERE user_id = ?1 AND lesson_id = ?2
            ORDER BY position ASC
        ",
    )
    .bind(user)
    .bind(lesson)
    .fetch_all(pool)
    .await
    .map_err(io)?;

    let mut slides = Vec::with_capacity(rows.len());
    for row in &rows {
        slides.push(map_slide_row(row)?);
    }
    Ok(slides)
}

fn map_lesson_row(
    row: &sqlx::sqlite::SqliteRow,
    user_id: UserId,
    slides: Vec<SlideProgress>,
) -> Result<LessonProgress, StorageError> {
    let lesson_id = lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?)?;
    LessonProgress::from_persisted(
        user_id,
        lesson_id,
        row.try_get("completed").map_err(ser)?,
        row.try_get("completed_date").map_err(ser)?,
        slides,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl LessonProgressRepository for SqliteStore {
    async fn get_lesson_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let user = id_i64("user_id", user_id.value())?;
        let lesson = id_i64("lesson_id", lesson_id.value())?;

        let Some(row) = sqlx::query(
            r"
                SELECT lesson_id, completed, completed_date
                FROM lesson_progress
                WHERE user_id = ?1 AND lesson_id = ?2
            ",
        )
        .bind(user)
        .bind(lesson)
        .fetch_optional(&self.pool)
        .await
        .map_err(io)?
        else {
            return Ok(None);
        };

        let slides = slides_for(&self.pool, user, lesson).await?;
        Ok(Some(map_lesson_row(&row, user_id, slides)?))
    }

    async fn upsert_lesson_progress(&self, progress: &LessonProgress) -> Result<(), StorageError> {
        let user = id_i64("user_id", progress.user_id().value())?;
        let lesson = id_i64("lesson_id", progress.lesson_id().value())?;

        let mut tx = self.pool.begin().await.map_err(io)?;

        sqlx::query(
            r"
                INSERT INTO lesson_progress (user_id, lesson_id, completed, completed_date)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                    completed = excluded.completed,
                    completed_date = excluded.completed_date
            ",
        )
        .bind(user)
        .bind(lesson)
        .bind(progress.completed())
        .bind(progress.completed_date())
        .execute(&mut *tx)
        .await
        .map_err(io)?;

        // Slide rows are embedded in the record; rewrite them in order.
        sqlx::query("DELETE FROM slide_progress WHERE user_id = ?1 AND lesson_id = ?2")
            .bind(user)
            .bind(lesson)
            .execute(&mut *tx)
            .await
            .map_err(io)?;

        for (position, slide) in progress.slides().iter().enumerate() {
            let slide_id = id_i64("slide_id", slide.slide_id().value())?;
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("slide position overflow".into()))?;
            sqlx::query(
                r"
                    INSERT INTO slide_progress (
                        user_id, lesson_id, slide_id, position, viewed, time_spent_seconds
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(user)
            .bind(lesson)
            .bind(slide_id)
            .bind(position)
            .bind(slide.viewed())
            .bind(i64::from(slide.time_spent_seconds()))
            .execute(&mut *tx)
            .await
            .map_err(io)?;
        }

        tx.commit().await.map_err(io)
    }

    async fn list_lesson_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let user = id_i64("user_id", user_id.value())?;

        let rows = sqlx::query(
            r"
                SELECT lesson_id, completed, completed_date
                FROM lesson_progress
                WHERE user_id = ?1
                ORDER BY lesson_id ASC
            ",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(io)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let lesson: i64 = row.try_get("lesson_id").map_err(ser)?;
            let slides = slides_for(&self.pool, user, lesson).await?;
            out.push(map_lesson_row(row, user_id, slides)?);
        }
        Ok(out)
    }
}
