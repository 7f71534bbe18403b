use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::badge::{Badge, BadgeId};
use crate::model::ids::UserId;
use crate::time::calendar_days_between;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("correct answers ({correct}) exceed total questions ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("completed lessons ({completed}) exceed lesson catalog size ({total})")]
    LessonsExceedTotal { completed: u32, total: u32 },

    #[error("display name cannot be empty")]
    EmptyName,
}

/// Cumulative learning state for a single learner.
///
/// Created once at first launch with zeroed counters, mutated by every
/// answer and lesson-completion command, and never deleted. Counters here are
/// materialized views over the answer event log; replaying the log reproduces
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    user_id: UserId,
    display_name: String,
    total_questions: u32,
    correct_answers: u32,
    time_spent_seconds: u64,
    current_question_index: u32,
    completed_lessons_count: u32,
    total_lessons_count: u32,
    streak_days: u32,
    last_activity_date: Option<DateTime<Utc>>,
    last_login_date: Option<DateTime<Utc>>,
    badges: Vec<Badge>,
}

impl ProgressRecord {
    /// Fresh record with zeroed counters for a first launch.
    #[must_use]
    pub fn new(user_id: UserId, display_name: impl Into<String>, total_lessons_count: u32) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            total_questions: 0,
            correct_answers: 0,
            time_spent_seconds: 0,
            current_question_index: 0,
            completed_lessons_count: 0,
            total_lessons_count,
            streak_days: 0,
            last_activity_date: None,
            last_login_date: None,
            badges: Vec::new(),
        }
    }

    /// Rehydrate a progress record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` when counters violate their invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        display_name: String,
        total_questions: u32,
        correct_answers: u32,
        time_spent_seconds: u64,
        current_question_index: u32,
        completed_lessons_count: u32,
        total_lessons_count: u32,
        streak_days: u32,
        last_activity_date: Option<DateTime<Utc>>,
        last_login_date: Option<DateTime<Utc>>,
        badges: Vec<Badge>,
    ) -> Result<Self, ProgressError> {
        if correct_answers > total_questions {
            return Err(ProgressError::CorrectExceedsTotal {
                correct: correct_answers,
                total: total_questions,
            });
        }
        if completed_lessons_count > total_lessons_count {
            return Err(ProgressError::LessonsExceedTotal {
                completed: completed_lessons_count,
                total: total_lessons_count,
            });
        }

        Ok(Self {
            user_id,
            display_name,
            total_questions,
            correct_answers,
            time_spent_seconds,
            current_question_index,
            completed_lessons_count,
            total_lessons_count,
            streak_days,
            last_activity_date,
            last_login_date,
            badges,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    /// Exact accumulated answer time.
    #[must_use]
    pub fn time_spent_seconds(&self) -> u64 {
        self.time_spent_seconds
    }

    /// Whole minutes of accumulated answer time.
    #[must_use]
    pub fn time_spent_minutes(&self) -> u32 {
        u32::try_from(self.time_spent_seconds / 60).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn completed_lessons_count(&self) -> u32 {
        self.completed_lessons_count
    }

    #[must_use]
    pub fn total_lessons_count(&self) -> u32 {
        self.total_lessons_count
    }

    #[must_use]
    pub fn streak_days(&self) -> u32 {
        self.streak_days
    }

    #[must_use]
    pub fn last_activity_date(&self) -> Option<DateTime<Utc>> {
        self.last_activity_date
    }

    #[must_use]
    pub fn last_login_date(&self) -> Option<DateTime<Utc>> {
        self.last_login_date
    }

    #[must_use]
    pub fn badges(&self) -> &[Badge] {
        &self.badges
    }

    /// Rolling accuracy percentage; 0 for a learner with no answers yet.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        f64::from(self.correct_answers) / f64::from(self.total_questions) * 100.0
    }

    /// Raw stored question cursor.
    #[must_use]
    pub fn current_question_index(&self) -> u32 {
        self.current_question_index
    }

    /// Cursor normalized to the active question set.
    ///
    /// The stored value is kept independent of whichever quiz mode is active;
    /// normalizing modulo the set length keeps it total across set switches.
    #[must_use]
    pub fn question_cursor(&self, set_len: u32) -> u32 {
        if set_len == 0 {
            0
        } else {
            self.current_question_index % set_len
        }
    }

    /// Records one answered question and touches activity/streak state.
    pub fn record_answer(&mut self, correct: bool, time_spent_seconds: u32, now: DateTime<Utc>) {
        self.total_questions = self.total_questions.saturating_add(1);
        if correct {
            self.correct_answers = self.correct_answers.saturating_add(1);
        }
        self.time_spent_seconds = self
            .time_spent_seconds
            .saturating_add(u64::from(time_spent_seconds));
        self.touch_activity(now);
    }

    /// Advances the question cursor, wrapping modulo the active set length.
    pub fn advance_question_index(&mut self, set_len: u32) {
        if set_len == 0 {
            self.current_question_index = 0;
        } else {
            self.current_question_index =
                (self.question_cursor(set_len) + 1) % set_len;
        }
    }

    /// Resets the question cursor, e.g. when the active question set changes.
    pub fn reset_question_index(&mut self) {
        self.current_question_index = 0;
    }

    /// Counts one completed lesson, capped at the catalog size.
    pub fn record_lesson_completed(&mut self) {
        self.completed_lessons_count = self
            .completed_lessons_count
            .saturating_add(1)
            .min(self.total_lessons_count);
    }

    /// Updates streak and activity timestamps for an action at `now`.
    ///
    /// Same-day activity leaves the streak unchanged, next-day activity
    /// extends it, and a longer gap restarts it at 1.
    pub fn touch_activity(&mut self, now: DateTime<Utc>) {
        match self.last_activity_date {
            None => self.streak_days = 1,
            Some(previous) => match calendar_days_between(previous, now) {
                0 => {}
                1 => self.streak_days = self.streak_days.saturating_add(1),
                days if days > 1 => self.streak_days = 1,
                // Clock went backwards; keep the streak and the newer stamp.
                _ => return,
            },
        }
        self.last_activity_date = Some(now);
    }

    /// Stamps a login and counts it as activity.
    pub fn record_login(&mut self, now: DateTime<Utc>) {
        self.last_login_date = Some(now);
        self.touch_activity(now);
    }

    /// Changes the display name.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::EmptyName` if the name is blank after trimming.
    pub fn rename(&mut self, name: &str) -> Result<(), ProgressError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ProgressError::EmptyName);
        }
        self.display_name = trimmed.to_string();
        Ok(())
    }

    /// True when the badge with `id` is already earned on this record.
    #[must_use]
    pub fn has_earned(&self, id: BadgeId) -> bool {
        self.badges.iter().any(|b| b.id() == id && b.earned())
    }

    /// Merges newly earned badges into the owned collection.
    ///
    /// Already-earned ids are skipped so an earned date is never overwritten.
    pub fn merge_badges(&mut self, earned: Vec<Badge>) {
        for badge in earned {
            if badge.earned() && !self.has_earned(badge.id()) {
                self.badges.push(badge);
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::badge::{Badge, badge_catalog};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn fresh() -> ProgressRecord {
        ProgressRecord::new(UserId::new(1), "Learner", 12)
    }

    #[test]
    fn answers_never_break_the_counter_invariant() {
        let mut progress = fresh();
        for i in 0..100 {
            progress.record_answer(i % 3 == 0, 10, fixed_now());
            assert!(progress.correct_answers() <= progress.total_questions());
        }
        assert_eq!(progress.total_questions(), 100);
    }

    #[test]
    fn accuracy_is_zero_without_answers() {
        let progress = fresh();
        assert_eq!(progress.accuracy(), 0.0);
    }

    #[test]
    fn time_accumulates_in_seconds_and_reports_minutes() {
        let mut progress = fresh();
        for _ in 0..5 {
            progress.record_answer(true, 90, fixed_now());
        }
        assert_eq!(progress.time_spent_seconds(), 450);
        assert_eq!(progress.time_spent_minutes(), 7);
    }

    #[test]
    fn question_index_wraps_modulo_set_length() {
        let mut progress = fresh();
        for _ in 0..5 {
            progress.advance_question_index(4);
        }
        assert_eq!(progress.current_question_index(), 1);
        assert_eq!(progress.question_cursor(4), 1);
        // A shorter active set normalizes without resetting stored state.
        assert_eq!(progress.question_cursor(1), 0);
        progress.advance_question_index(0);
        assert_eq!(progress.current_question_index(), 0);
    }

    #[test]
    fn streak_extends_on_next_day_and_resets_after_gap() {
        let mut progress = fresh();
        let day1 = fixed_now();
        progress.touch_activity(day1);
        assert_eq!(progress.streak_days(), 1);

        progress.touch_activity(day1 + Duration::hours(2));
        assert_eq!(progress.streak_days(), 1);

        progress.touch_activity(day1 + Duration::days(1));
        assert_eq!(progress.streak_days(), 2);

        progress.touch_activity(day1 + Duration::days(5));
        assert_eq!(progress.streak_days(), 1);
    }

    #[test]
    fn lessons_cap_at_catalog_size() {
        let mut progress = ProgressRecord::new(UserId::new(1), "Learner", 2);
        for _ in 0..5 {
            progress.record_lesson_completed();
        }
        assert_eq!(progress.completed_lessons_count(), 2);
    }

    #[test]
    fn rename_rejects_blank_names() {
        let mut progress = fresh();
        assert!(matches!(
            progress.rename("   "),
            Err(ProgressError::EmptyName)
        ));
        progress.rename("  Ada ").unwrap();
        assert_eq!(progress.display_name(), "Ada");
    }

    #[test]
    fn merge_keeps_first_earned_date() {
        let mut progress = fresh();
        let spec = &badge_catalog()[0];
        let first = Badge::earned_from_spec(spec, fixed_now());
        let later = Badge::earned_from_spec(spec, fixed_now() + Duration::days(1));

        progress.merge_badges(vec![first.clone()]);
        progress.merge_badges(vec![later]);

        assert_eq!(progress.badges().len(), 1);
        assert_eq!(progress.badges()[0].earned_date(), first.earned_date());
    }

    #[test]
    fn persisted_invariants_are_enforced() {
        let err = ProgressRecord::from_persisted(
            UserId::new(1),
            "Learner".into(),
            3,
            4,
            0,
            0,
            0,
            12,
            0,
            None,
            None,
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ProgressError::CorrectExceedsTotal { .. }));

        let err = ProgressRecord::from_persisted(
            UserId::new(1),
            "Learner".into(),
            0,
            0,
            0,
            0,
            13,
            12,
            0,
            None,
            None,
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ProgressError::LessonsExceedTotal { .. }));
    }
}
