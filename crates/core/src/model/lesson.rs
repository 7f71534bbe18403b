use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{LessonId, SlideId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonProgressError {
    #[error("completed lesson is missing its completion date")]
    MissingCompletedDate,

    #[error("incomplete lesson carries a completion date")]
    UnexpectedCompletedDate,
}

/// Viewing state for a single slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideProgress {
    slide_id: SlideId,
    viewed: bool,
    time_spent_seconds: u32,
}

impl SlideProgress {
    #[must_use]
    pub fn new(slide_id: SlideId, viewed: bool, time_spent_seconds: u32) -> Self {
        Self {
            slide_id,
            viewed,
            time_spent_seconds,
        }
    }

    #[must_use]
    pub fn slide_id(&self) -> SlideId {
        self.slide_id
    }

    #[must_use]
    pub fn viewed(&self) -> bool {
        self.viewed
    }

    #[must_use]
    pub fn time_spent_seconds(&self) -> u32 {
        self.time_spent_seconds
    }
}

/// Per-lesson progress for a learner.
///
/// Created lazily on the first slide view of a lesson. `completed`
/// transitions false to true exactly once, when every slide of the lesson
/// has been viewed; after that the record only accumulates viewing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonProgress {
    user_id: UserId,
    lesson_id: LessonId,
    completed: bool,
    completed_date: Option<DateTime<Utc>>,
    slides: Vec<SlideProgress>,
}

impl LessonProgress {
    /// Empty record for the first slide view of a lesson.
    #[must_use]
    pub fn new(user_id: UserId, lesson_id: LessonId) -> Self {
        Self {
            user_id,
            lesson_id,
            completed: false,
            completed_date: None,
            slides: Vec::new(),
        }
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `LessonProgressError` when the completed flag and date disagree.
    pub fn from_persisted(
        user_id: UserId,
        lesson_id: LessonId,
        completed: bool,
        completed_date: Option<DateTime<Utc>>,
        slides: Vec<SlideProgress>,
    ) -> Result<Self, LessonProgressError> {
        if completed && completed_date.is_none() {
            return Err(LessonProgressError::MissingCompletedDate);
        }
        if !completed && completed_date.is_some() {
            return Err(LessonProgressError::UnexpectedCompletedDate);
        }

        Ok(Self {
            user_id,
            lesson_id,
            completed,
            completed_date,
            slides,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn completed_date(&self) -> Option<DateTime<Utc>> {
        self.completed_date
    }

    /// Slides in first-view order.
    #[must_use]
    pub fn slides(&self) -> &[SlideProgress] {
        &self.slides
    }

    /// Total viewing time across all slides.
    #[must_use]
    pub fn time_spent_seconds(&self) -> u64 {
        self.slides
            .iter()
            .map(|s| u64::from(s.time_spent_seconds))
            .sum()
    }

    /// True when every slide in `lesson_slides` has been viewed.
    #[must_use]
    pub fn covers(&self, lesson_slides: &[SlideId]) -> bool {
        lesson_slides.iter().all(|slide_id| {
            self.slides
                .iter()
                .any(|s| s.slide_id() == *slide_id && s.viewed())
        })
    }

    /// Records a slide view, accumulating time on repeat views.
    pub fn record_slide_view(&mut self, slide_id: SlideId, time_spent_seconds: u32) {
        if let Some(existing) = self.slides.iter_mut().find(|s| s.slide_id == slide_id) {
            existing.viewed = true;
            existing.time_spent_seconds =
                existing.time_spent_seconds.saturating_add(time_spent_seconds);
        } else {
            self.slides
                .push(SlideProgress::new(slide_id, true, time_spent_seconds));
        }
    }

    /// Marks the lesson complete. The first call wins; later calls are no-ops.
    ///
    /// Returns true when this call performed the transition.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.completed_date = Some(now);
        true
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn slide_views_accumulate_time() {
        let mut lesson = LessonProgress::new(UserId::new(1), LessonId::new(1));
        lesson.record_slide_view(SlideId::new(1), 30);
        lesson.record_slide_view(SlideId::new(1), 15);
        lesson.record_slide_view(SlideId::new(2), 20);

        assert_eq!(lesson.slides().len(), 2);
        assert_eq!(lesson.slides()[0].time_spent_seconds(), 45);
        assert_eq!(lesson.time_spent_seconds(), 65);
    }

    #[test]
    fn coverage_requires_every_slide() {
        let all = vec![SlideId::new(1), SlideId::new(2), SlideId::new(3)];
        let mut lesson = LessonProgress::new(UserId::new(1), LessonId::new(1));
        lesson.record_slide_view(SlideId::new(1), 10);
        lesson.record_slide_view(SlideId::new(3), 10);
        assert!(!lesson.covers(&all));

        lesson.record_slide_view(SlideId::new(2), 10);
        assert!(lesson.covers(&all));
    }

    #[test]
    fn completion_happens_exactly_once() {
        let mut lesson = LessonProgress::new(UserId::new(1), LessonId::new(1));
        let first = fixed_now();
        assert!(lesson.complete(first));
        assert!(!lesson.complete(first + Duration::days(1)));
        assert_eq!(lesson.completed_date(), Some(first));
    }

    #[test]
    fn persisted_flag_and_date_must_agree() {
        let err = LessonProgress::from_persisted(
            UserId::new(1),
            LessonId::new(1),
            true,
            None,
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, LessonProgressError::MissingCompletedDate));
    }
}
