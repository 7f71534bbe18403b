use sqlx::Row;

use study_core::model::{
    Badge, BadgeId, BadgeKind, Difficulty, EventId, LessonId, QuestionId, QuizAnswerEvent,
    SlideId, SlideProgress, Tally, Topic, UserId,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn io<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Io(e.to_string())
}

/// Maps a sqlx error to `DuplicateEvent` on unique-key violations.
pub(crate) fn append_err(e: sqlx::Error) -> StorageError {
    let unique = e
        .as_database_error()
        .is_some_and(|db| db.kind() == sqlx::error::ErrorKind::UniqueViolation);
    if unique {
        StorageError::DuplicateEvent
    } else {
        StorageError::Io(e.to_string())
    }
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn slide_id_from_i64(v: i64) -> Result<SlideId, StorageError> {
    Ok(SlideId::new(i64_to_u64("slide_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn event_id_from_i64(v: i64) -> Result<EventId, StorageError> {
    Ok(EventId::new(i64_to_u64("event_id", v)?))
}

/// Converts a `BadgeKind` to its storage representation.
pub(crate) fn badge_kind_to_str(kind: BadgeKind) -> &'static str {
    kind.as_str()
}

pub(crate) fn map_badge_row(row: &sqlx::sqlite::SqliteRow) -> Result<Badge, StorageError> {
    let id_str: String = row.try_get("badge_id").map_err(ser)?;
    let id = BadgeId::parse(&id_str).map_err(ser)?;
    let kind_str: String = row.try_get("kind").map_err(ser)?;
    let kind = BadgeKind::parse(&kind_str).map_err(ser)?;

    Badge::from_persisted(
        id,
        kind,
        row.try_get("title").map_err(ser)?,
        row.try_get("description").map_err(ser)?,
        row.try_get("earned").map_err(ser)?,
        row.try_get("earned_date").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_slide_row(row: &sqlx::sqlite::SqliteRow) -> Result<SlideProgress, StorageError> {
    let slide_id = slide_id_from_i64(row.try_get::<i64, _>("slide_id").map_err(ser)?)?;
    let viewed: bool = row.try_get("viewed").map_err(ser)?;
    let time = u32_from_i64(
        "time_spent_seconds",
        row.try_get::<i64, _>("time_spent_seconds").map_err(ser)?,
    )?;
    Ok(SlideProgress::new(slide_id, viewed, time))
}

pub(crate) fn map_event_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<QuizAnswerEvent, StorageError> {
    Ok(QuizAnswerEvent::from_persisted(
        event_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
        row.try_get("correct").map_err(ser)?,
        u32_from_i64(
            "time_spent_seconds",
            row.try_get::<i64, _>("time_spent_seconds").map_err(ser)?,
        )?,
        row.try_get("timestamp").map_err(ser)?,
    ))
}

/// Breakdown dimension encodings for `quiz_result_breakdowns`.
pub(crate) const DIMENSION_TOPIC: &str = "topic";
pub(crate) const DIMENSION_DIFFICULTY: &str = "difficulty";

pub(crate) struct BreakdownRow {
    pub dimension: String,
    pub bucket: String,
    pub tally: Tally,
}

pub(crate) fn map_breakdown_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<BreakdownRow, StorageError> {
    let total = u32_from_i64("total", row.try_get::<i64, _>("total").map_err(ser)?)?;
    let correct = u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?;
    Ok(BreakdownRow {
        dimension: row.try_get("dimension").map_err(ser)?,
        bucket: row.try_get("bucket").map_err(ser)?,
        tally: Tally::new(total, correct),
    })
}

pub(crate) fn topic_from_bucket(bucket: &str) -> Result<Topic, StorageError> {
    Topic::new(bucket).map_err(ser)
}

pub(crate) fn difficulty_from_bucket(bucket: &str) -> Result<Difficulty, StorageError> {
    Difficulty::parse(bucket).map_err(ser)
}
