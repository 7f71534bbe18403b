use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storage::repository::{
    AnswerEventRepository, LessonProgressRepository, ProgressRepository, StorageError,
};
use study_core::Clock;
use study_core::model::{
    Badge, BadgeId, BadgeKind, EventId, LessonId, LessonProgress, ProgressRecord, QuestionId,
    QuizAnswerEvent, SlideId, SlideProgress, UserId,
};

use crate::error::ExportError;

//
// ─── EXPORT SHAPE ──────────────────────────────────────────────────────────────
//

/// Full, human-inspectable snapshot of a learner's data.
///
/// Serialized as JSON for backup and debugging; `import` reconstructs an
/// equivalent progress record, lesson set, and event log from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDataExport {
    pub exported_at: DateTime<Utc>,
    pub progress: ProgressExport,
    pub lessons: Vec<LessonProgressExport>,
    pub events: Vec<AnswerEventExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressExport {
    pub user_id: UserId,
    pub display_name: String,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub time_spent_seconds: u64,
    pub current_question_index: u32,
    pub completed_lessons_count: u32,
    pub total_lessons_count: u32,
    pub streak_days: u32,
    pub last_activity_date: Option<DateTime<Utc>>,
    pub last_login_date: Option<DateTime<Utc>>,
    pub badges: Vec<BadgeExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeExport {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub description: String,
    pub earned: bool,
    pub earned_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonProgressExport {
    pub lesson_id: LessonId,
    pub completed: bool,
    pub completed_date: Option<DateTime<Utc>>,
    pub slides: Vec<SlideExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideExport {
    pub slide_id: SlideId,
    pub viewed: bool,
    pub time_spent_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEventExport {
    pub id: Option<EventId>,
    pub question_id: QuestionId,
    pub correct: bool,
    pub time_spent_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

//
// ─── MAPPING ──────────────────────────────────────────────────────────────────
//

fn export_badge(badge: &Badge) -> BadgeExport {
    BadgeExport {
        id: badge.id().as_str().to_string(),
        kind: badge.kind().as_str().to_string(),
        title: badge.title().to_string(),
        description: badge.description().to_string(),
        earned: badge.earned(),
        earned_date: badge.earned_date(),
    }
}

fn export_progress(progress: &ProgressRecord) -> ProgressExport {
    ProgressExport {
        user_id: progress.user_id(),
        display_name: progress.display_name().to_string(),
        total_questions: progress.total_questions(),
        correct_answers: progress.correct_answers(),
        time_spent_seconds: progress.time_spent_seconds(),
        current_question_index: progress.current_question_index(),
        completed_lessons_count: progress.completed_lessons_count(),
        total_lessons_count: progress.total_lessons_count(),
        streak_days: progress.streak_days(),
        last_activity_date: progress.last_activity_date(),
        last_login_date: progress.last_login_date(),
        badges: progress.badges().iter().map(export_badge).collect(),
    }
}

fn export_lesson(lesson: &LessonProgress) -> LessonProgressExport {
    LessonProgressExport {
        lesson_id: lesson.lesson_id(),
        completed: lesson.completed(),
        completed_date: lesson.completed_date(),
        slides: lesson
            .slides()
            .iter()
            .map(|s| SlideExport {
                slide_id: s.slide_id(),
                viewed: s.viewed(),
                time_spent_seconds: s.time_spent_seconds(),
            })
            .collect(),
    }
}

fn export_event(event: &QuizAnswerEvent) -> AnswerEventExport {
    AnswerEventExport {
        id: event.id(),
        question_id: event.question_id(),
        correct: event.correct(),
        time_spent_seconds: event.time_spent_seconds(),
        timestamp: event.timestamp(),
    }
}

fn invalid<E: std::fmt::Display>(e: E) -> ExportError {
    ExportError::Invalid(e.to_string())
}

fn import_progress(export: &ProgressExport) -> Result<ProgressRecord, ExportError> {
    let mut badges = Vec::with_capacity(export.badges.len());
    for badge in &export.badges {
        let id = BadgeId::parse(&badge.id).map_err(invalid)?;
        let kind = BadgeKind::parse(&badge.kind).map_err(invalid)?;
        badges.push(
            Badge::from_persisted(
                id,
                kind,
                badge.title.clone(),
                badge.description.clone(),
                badge.earned,
                badge.earned_date,
            )
            .map_err(invalid)?,
        );
    }

    ProgressRecord::from_persisted(
        export.user_id,
        export.display_name.clone(),
        export.total_questions,
        export.correct_answers,
        export.time_spent_seconds,
        export.current_question_index,
        export.completed_lessons_count,
        export.total_lessons_count,
        export.streak_days,
        export.last_activity_date,
        export.last_login_date,
        badges,
    )
    .map_err(invalid)
}

//
// ─── EXPORT SERVICE ───────────────────────────────────────────────────────────
//

/// Builds and restores JSON snapshots of one learner's data.
#[derive(Clone)]
pub struct ExportService {
    clock: Clock,
    user_id: UserId,
    progress: Arc<dyn ProgressRepository>,
    lessons: Arc<dyn LessonProgressRepository>,
    events: Arc<dyn AnswerEventRepository>,
}

impl ExportService {
    #[must_use]
    pub fn new(
        clock: Clock,
        user_id: UserId,
        progress: Arc<dyn ProgressRepository>,
        lessons: Arc<dyn LessonProgressRepository>,
        events: Arc<dyn AnswerEventRepository>,
    ) -> Self {
        Self {
            clock,
            user_id,
            progress,
            lessons,
            events,
        }
    }

    /// Snapshot the learner's progress, lesson progress, and event history.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Storage` with `StorageError::NotFound` if the
    /// progress record was never created, or on storage-medium failures.
    pub async fn export(&self) -> Result<UserDataExport, ExportError> {
        let progress = self
            .progress
            .get_progress(self.user_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        let lessons = self.lessons.list_lesson_progress(self.user_id).await?;
        let events = self.events.list_events(self.user_id).await?;

        Ok(UserDataExport {
            exported_at: self.clock.now(),
            progress: export_progress(&progress),
            lessons: lessons.iter().map(export_lesson).collect(),
            events: events.iter().map(export_event).collect(),
        })
    }

    /// Serialize a snapshot as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Json` if serialization fails.
    pub fn to_json(export: &UserDataExport) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(export)?)
    }

    /// Parse a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Json` if the document does not match the schema.
    pub fn from_json(json: &str) -> Result<UserDataExport, ExportError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Restore a snapshot into the store.
    ///
    /// Events that are already present (matching ids) are skipped so a
    /// restore into a partially populated store converges instead of failing.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Invalid` when the snapshot violates domain
    /// invariants, or `ExportError::Storage` on storage failures.
    pub async fn import(&self, export: &UserDataExport) -> Result<(), ExportError> {
        let progress = import_progress(&export.progress)?;
        self.progress.upsert_progress(&progress).await?;

        for lesson in &export.lessons {
            let slides = lesson
                .slides
                .iter()
                .map(|s| SlideProgress::new(s.slide_id, s.viewed, s.time_spent_seconds))
                .collect();
            let record = LessonProgress::from_persisted(
                export.progress.user_id,
                lesson.lesson_id,
                lesson.completed,
                lesson.completed_date,
                slides,
            )
            .map_err(invalid)?;
            self.lessons.upsert_lesson_progress(&record).await?;
        }

        for event in &export.events {
            let record = QuizAnswerEvent::new(
                export.progress.user_id,
                event.question_id,
                event.correct,
                i64::from(event.time_spent_seconds),
                event.timestamp,
            )
            .map_err(invalid)?;
            let record = match event.id {
                Some(id) => record.with_id(id),
                None => record,
            };
            match self.events.append_event(&record).await {
                Ok(_) => {}
                Err(StorageError::DuplicateEvent) => {
                    tracing::debug!(event_id = ?event.id, "skipping already stored event");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::Storage;
    use study_core::model::badge_catalog;
    use study_core::time::{fixed_clock, fixed_now};

    fn exporter(storage: &Storage) -> ExportService {
        ExportService::new(
            fixed_clock(),
            UserId::new(1),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.events),
        )
    }

    async fn seed(storage: &Storage) {
        let mut progress = ProgressRecord::new(UserId::new(1), "Ada", 12);
        progress.record_answer(true, 30, fixed_now());
        progress.record_answer(false, 20, fixed_now());
        progress.merge_badges(vec![Badge::earned_from_spec(
            &badge_catalog()[0],
            fixed_now(),
        )]);
        storage.progress.upsert_progress(&progress).await.unwrap();

        let mut lesson = LessonProgress::new(UserId::new(1), LessonId::new(2));
        lesson.record_slide_view(SlideId::new(1), 60);
        lesson.complete(fixed_now());
        storage.lessons.upsert_lesson_progress(&lesson).await.unwrap();

        for question in [1_u64, 2] {
            let event = QuizAnswerEvent::new(
                UserId::new(1),
                QuestionId::new(question),
                question == 1,
                25,
                fixed_now(),
            )
            .unwrap();
            storage.events.append_event(&event).await.unwrap();
        }
    }

    #[tokio::test]
    async fn export_import_round_trips_through_json() {
        let source = Storage::in_memory();
        seed(&source).await;

        let export = exporter(&source).export().await.unwrap();
        let json = ExportService::to_json(&export).unwrap();
        let parsed = ExportService::from_json(&json).unwrap();
        assert_eq!(parsed, export);

        let restored = Storage::in_memory();
        exporter(&restored).import(&parsed).await.unwrap();

        let original_progress = source
            .progress
            .get_progress(UserId::new(1))
            .await
            .unwrap()
            .unwrap();
        let restored_progress = restored
            .progress
            .get_progress(UserId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored_progress, original_progress);

        let original_lessons = source
            .lessons
            .list_lesson_progress(UserId::new(1))
            .await
            .unwrap();
        let restored_lessons = restored
            .lessons
            .list_lesson_progress(UserId::new(1))
            .await
            .unwrap();
        assert_eq!(restored_lessons, original_lessons);

        let original_events = source.events.list_events(UserId::new(1)).await.unwrap();
        let restored_events = restored.events.list_events(UserId::new(1)).await.unwrap();
        assert_eq!(restored_events, original_events);
    }

    #[tokio::test]
    async fn importing_twice_converges() {
        let source = Storage::in_memory();
        seed(&source).await;
        let export = exporter(&source).export().await.unwrap();

        let restored = Storage::in_memory();
        exporter(&restored).import(&export).await.unwrap();
        exporter(&restored).import(&export).await.unwrap();

        assert_eq!(
            restored.events.count_events(UserId::new(1)).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn export_without_progress_is_not_found() {
        let storage = Storage::in_memory();
        let err = exporter(&storage).export().await.unwrap_err();
        assert!(matches!(err, ExportError::Storage(StorageError::NotFound)));
    }
}
