use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, info};

use storage::repository::{
    AnswerEventRepository, LessonProgressRepository, ProgressRepository, QuizResultRepository,
};
use study_core::Clock;
use study_core::aggregator::{SessionWindow, aggregate};
use study_core::catalog::{LessonCatalog, Question, QuestionCatalog};
use study_core::model::{
    Badge, LessonId, LessonProgress, ProgressRecord, QuestionId, QuizAnswerEvent, QuizResult,
    SessionId, SlideId, SyncStatus, Topic, UserId, evaluate,
};
use study_core::selector::select_questions;

use crate::error::{CommandError, ValidationError};
use crate::sync_service::SyncCoordinator;

/// What a command returns to the caller: the updated record, any badges the
/// mutation earned, and the quiz result when the answer closed a session.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub progress: ProgressRecord,
    pub new_badges: Vec<Badge>,
    pub quiz_result: Option<QuizResult>,
}

/// Command and query surface over the learner's durable state.
///
/// Commands are processed one at a time per learner; every committed store
/// mutation is reported to the sync coordinator for reconciliation
/// accounting.
#[derive(Clone)]
pub struct LearningService {
    clock: Clock,
    user_id: UserId,
    questions: Arc<dyn QuestionCatalog>,
    lesson_catalog: Arc<dyn LessonCatalog>,
    progress: Arc<dyn ProgressRepository>,
    lessons: Arc<dyn LessonProgressRepository>,
    events: Arc<dyn AnswerEventRepository>,
    results: Arc<dyn QuizResultRepository>,
    sync: Arc<SyncCoordinator>,
    window: SessionWindow,
    shuffle_questions: bool,
}

impl LearningService {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        clock: Clock,
        user_id: UserId,
        questions: Arc<dyn QuestionCatalog>,
        lesson_catalog: Arc<dyn LessonCatalog>,
        progress: Arc<dyn ProgressRepository>,
        lessons: Arc<dyn LessonProgressRepository>,
        events: Arc<dyn AnswerEventRepository>,
        results: Arc<dyn QuizResultRepository>,
        sync: Arc<SyncCoordinator>,
    ) -> Self {
        Self {
            clock,
            user_id,
            questions,
            lesson_catalog,
            progress,
            lessons,
            events,
            results,
            sync,
            window: SessionWindow::default(),
            shuffle_questions: false,
        }
    }

    /// Override the session batch size (default 10).
    #[must_use]
    pub fn with_session_window(mut self, window: SessionWindow) -> Self {
        self.window = window;
        self
    }

    /// Enable shuffling of the adaptive question pool before it is returned.
    ///
    /// Selection itself stays deterministic; only presentation order varies.
    #[must_use]
    pub fn with_shuffle_questions(mut self, shuffle: bool) -> Self {
        self.shuffle_questions = shuffle;
        self
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    //
    // ─── COMMANDS ─────────────────────────────────────────────────────────
    //

    /// Record an answered quiz question.
    ///
    /// Appends to the event log, updates the progress counters and question
    /// cursor, evaluates badges, and rolls up a quiz result when the answer
    /// closes a session window.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` before any mutation for bad input, or
    /// `StorageError` when a write fails (the command is aborted; entities
    /// keep their last committed state).
    pub async fn submit_answer(
        &self,
        question_id: QuestionId,
        correct: bool,
        time_spent_seconds: i64,
    ) -> Result<CommandOutcome, CommandError> {
        let now = self.clock.now();
        let event =
            QuizAnswerEvent::new(self.user_id, question_id, correct, time_spent_seconds, now)
                .map_err(ValidationError::from)?;

        let mut progress = self.load_progress().await?;

        self.events.append_event(&event).await?;
        self.sync.record_mutation().await?;

        progress.record_answer(correct, event.time_spent_seconds(), now);
        let active_set_len = u32::try_from(
            select_questions(self.questions.as_ref(), progress.accuracy(), &HashSet::new()).len(),
        )
        .unwrap_or(u32::MAX);
        progress.advance_question_index(active_set_len);

        let log = self.events.list_events(self.user_id).await?;
        let new_badges = self.award_badges(&mut progress, &log);

        self.progress.upsert_progress(&progress).await?;
        self.sync.record_mutation().await?;

        let quiz_result = self.maybe_close_session(&log).await?;
        debug!(
            question = %question_id,
            correct,
            total = progress.total_questions(),
            "answer recorded"
        );

        Ok(CommandOutcome {
            progress,
            new_badges,
            quiz_result,
        })
    }

    /// Record a viewed lesson slide, completing the lesson when every slide
    /// has been seen.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` before any mutation for bad input (unknown
    /// lesson, foreign slide, negative time), or `StorageError` when a write
    /// fails.
    pub async fn complete_lesson_slide(
        &self,
        lesson_id: LessonId,
        slide_id: SlideId,
        time_spent_seconds: i64,
    ) -> Result<CommandOutcome, CommandError> {
        let seconds = u32::try_from(time_spent_seconds)
            .map_err(|_| ValidationError::NegativeTimeSpent(time_spent_seconds))?;
        let lesson = self
            .lesson_catalog
            .lesson(lesson_id)
            .ok_or(ValidationError::UnknownLesson(lesson_id))?;
        if !lesson.contains_slide(slide_id) {
            return Err(ValidationError::SlideNotInLesson {
                lesson: lesson_id,
                slide: slide_id,
            }
            .into());
        }

        let now = self.clock.now();
        let mut record = match self.lessons.get_lesson_progress(self.user_id, lesson_id).await? {
            Some(record) => record,
            None => LessonProgress::new(self.user_id, lesson_id),
        };

        record.record_slide_view(slide_id, seconds);
        let completed_now = if !record.completed() && record.covers(&lesson.slides) {
            record.complete(now)
        } else {
            false
        };

        self.lessons.upsert_lesson_progress(&record).await?;
        self.sync.record_mutation().await?;

        let mut progress = self.load_progress().await?;
        progress.touch_activity(now);
        if completed_now {
            progress.record_lesson_completed();
            info!(lesson = %lesson_id, "lesson completed");
        }

        let log = self.events.list_events(self.user_id).await?;
        let new_badges = self.award_badges(&mut progress, &log);

        self.progress.upsert_progress(&progress).await?;
        self.sync.record_mutation().await?;

        Ok(CommandOutcome {
            progress,
            new_badges,
            quiz_result: None,
        })
    }

    /// Change the learner's display name.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyName` before any mutation for a blank
    /// name, or `StorageError` when the write fails.
    pub async fn rename_user(&self, name: &str) -> Result<CommandOutcome, CommandError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let mut progress = self.load_progress().await?;
        progress
            .rename(name)
            .map_err(|_| ValidationError::EmptyName)?;

        self.progress.upsert_progress(&progress).await?;
        self.sync.record_mutation().await?;

        Ok(CommandOutcome {
            progress,
            new_badges: Vec::new(),
            quiz_result: None,
        })
    }

    //
    // ─── QUERIES ──────────────────────────────────────────────────────────
    //

    /// Current progress record; a zeroed one if nothing is stored yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage-medium failures.
    pub async fn get_progress(&self) -> Result<ProgressRecord, CommandError> {
        self.load_progress().await
    }

    /// All aggregated quiz results, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage-medium failures.
    pub async fn get_quiz_results(&self) -> Result<Vec<QuizResult>, CommandError> {
        Ok(self.results.list_results(self.user_id).await?)
    }

    /// Current sync status (last sync time, pending count, cloud flag).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage-medium failures.
    pub async fn get_sync_status(&self) -> Result<SyncStatus, CommandError> {
        Ok(self.sync.status().await?)
    }

    /// Question pool for the next quiz, derived from accuracy and mastery.
    #[must_use]
    pub fn get_adaptive_questions(
        &self,
        accuracy: f64,
        mastered_topics: &HashSet<Topic>,
    ) -> Vec<Question> {
        let mut pool = select_questions(self.questions.as_ref(), accuracy, mastered_topics);
        if self.shuffle_questions {
            pool.shuffle(&mut rand::rng());
        }
        pool
    }

    //
    // ─── INTERNALS ────────────────────────────────────────────────────────
    //

    async fn load_progress(&self) -> Result<ProgressRecord, CommandError> {
        match self.progress.get_progress(self.user_id).await? {
            Some(progress) => Ok(progress),
            None => Ok(ProgressRecord::new(
                self.user_id,
                "Learner",
                self.lesson_catalog.lesson_count(),
            )),
        }
    }

    fn award_badges(
        &self,
        progress: &mut ProgressRecord,
        log: &[QuizAnswerEvent],
    ) -> Vec<Badge> {
        let new_badges = evaluate(progress, log, self.clock.now());
        if !new_badges.is_empty() {
            let ids: Vec<&str> = new_badges.iter().map(|b| b.id().as_str()).collect();
            info!(badges = ?ids, "badges earned");
            progress.merge_badges(new_badges.clone());
        }
        new_badges
    }

    /// Emits a quiz result when the log length just hit a session boundary.
    async fn maybe_close_session(
        &self,
        log: &[QuizAnswerEvent],
    ) -> Result<Option<QuizResult>, CommandError> {
        if !self.window.is_boundary(log.len()) {
            return Ok(None);
        }

        let batch = &log[log.len() - self.window.batch_size()..];
        let result = aggregate(
            SessionId::generate(),
            self.user_id,
            batch,
            &self.window,
            self.questions.as_ref(),
        )?;

        self.results.append_result(&result).await?;
        self.sync.record_mutation().await?;
        info!(
            session = %result.session_id(),
            accuracy = result.accuracy(),
            "quiz session aggregated"
        );
        Ok(Some(result))
    }
}
