use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema (progress with badges, lesson/slide progress, the
/// answer event log, quiz results with breakdowns, sync status, and indexes).
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS progress (
                    user_id INTEGER PRIMARY KEY,
                    display_name TEXT NOT NULL,
                    total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
                    correct_answers INTEGER NOT NULL
                        CHECK (correct_answers >= 0 AND correct_answers <= total_questions),
                    time_spent_seconds INTEGER NOT NULL CHECK (time_spent_seconds >= 0),
                    current_question_index INTEGER NOT NULL CHECK (current_question_index >= 0),
                    completed_lessons_count INTEGER NOT NULL
                        CHECK (completed_lessons_count >= 0
                           AND completed_lessons_count <= total_lessons_count),
                    total_lessons_count INTEGER NOT NULL CHECK (total_lessons_count >= 0),
                    streak_days INTEGER NOT NULL CHECK (streak_days >= 0),
                    last_activity_date TEXT,
                    last_login_date TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS badges (
                    user_id INTEGER NOT NULL,
                    badge_id TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    earned INTEGER NOT NULL,
                    earned_date TEXT,
                    PRIMARY KEY (user_id, badge_id),
                    FOREIGN KEY (user_id) REFERENCES progress(user_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_progress (
                    user_id INTEGER NOT NULL,
                    lesson_id INTEGER NOT NULL,
                    completed INTEGER NOT NULL,
                    completed_date TEXT,
                    PRIMARY KEY (user_id, lesson_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS slide_progress (
                    user_id INTEGER NOT NULL,
                    lesson_id INTEGER NOT NULL,
                    slide_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    viewed INTEGER NOT NULL,
                    time_spent_seconds INTEGER NOT NULL CHECK (time_spent_seconds >= 0),
                    PRIMARY KEY (user_id, lesson_id, slide_id),
                    FOREIGN KEY (user_id, lesson_id)
                        REFERENCES lesson_progress(user_id, lesson_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_answer_events (
                    id INTEGER PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    question_id INTEGER NOT NULL,
                    correct INTEGER NOT NULL,
                    time_spent_seconds INTEGER NOT NULL CHECK (time_spent_seconds >= 0),
                    timestamp TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_results (
                    session_id TEXT PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    completed_at TEXT NOT NULL,
                    total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
                    correct_answers INTEGER NOT NULL
                        CHECK (correct_answers >= 0 AND correct_answers <= total_questions),
                    total_time_seconds INTEGER NOT NULL CHECK (total_time_seconds >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_result_breakdowns (
                    session_id TEXT NOT NULL,
                    dimension TEXT NOT NULL CHECK (dimension IN ('topic', 'difficulty')),
                    bucket TEXT NOT NULL,
                    total INTEGER NOT NULL CHECK (total >= 0),
                    correct INTEGER NOT NULL CHECK (correct >= 0 AND correct <= total),
                    PRIMARY KEY (session_id, dimension, bucket),
                    FOREIGN KEY (session_id)
                        REFERENCES quiz_results(session_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sync_status (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    last_sync_timestamp TEXT,
                    pending_change_count INTEGER NOT NULL CHECK (pending_change_count >= 0),
                    cloud_enabled INTEGER NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_events_user_id
                    ON quiz_answer_events (user_id, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_results_user_completed
                    ON quiz_results (user_id, completed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
