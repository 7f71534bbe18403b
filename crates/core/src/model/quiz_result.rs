use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::catalog::QuestionCatalog;
use crate::model::QuizAnswerEvent;
use crate::model::difficulty::Difficulty;
use crate::model::ids::{SessionId, UserId};
use crate::model::topic::Topic;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizResultError {
    #[error("correct answers ({correct}) exceed total questions ({total})")]
    CountMismatch { correct: u32, total: u32 },
}

//
// ─── TALLY ────────────────────────────────────────────────────────────────────
//

/// Answer counts for one breakdown bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    total: u32,
    correct: u32,
}

impl Tally {
    #[must_use]
    pub fn new(total: u32, correct: u32) -> Self {
        Self { total, correct }
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    /// Percentage accuracy, rounded half-up; 0 when the bucket is empty.
    #[must_use]
    pub fn accuracy(&self) -> u32 {
        percentage(self.correct, self.total)
    }

    fn count(&mut self, correct: bool) {
        self.total = self.total.saturating_add(1);
        if correct {
            self.correct = self.correct.saturating_add(1);
        }
    }
}

/// Rounded percentage with the zero-total case defined as 0, never NaN.
#[must_use]
pub fn percentage(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let ratio = f64::from(correct) / f64::from(total) * 100.0;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        ratio.round() as u32
    }
}

//
// ─── QUIZ RESULT ──────────────────────────────────────────────────────────────
//

/// Aggregate summary for one completed quiz session.
///
/// Created once per session by the aggregator from the answer event log and
/// immutable after creation. Breakdowns use ordered maps so iteration and
/// serialization are stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    session_id: SessionId,
    user_id: UserId,
    completed_at: DateTime<Utc>,
    total_questions: u32,
    correct_answers: u32,
    total_time_seconds: u64,
    topic_breakdown: BTreeMap<Topic, Tally>,
    difficulty_breakdown: BTreeMap<Difficulty, Tally>,
}

impl QuizResult {
    /// Fold a batch of answer events into a result.
    ///
    /// Topic and difficulty are looked up from the question catalog; events
    /// whose question is unknown still count toward the session totals but
    /// cannot contribute to a breakdown bucket.
    #[must_use]
    pub fn from_events(
        session_id: SessionId,
        user_id: UserId,
        events: &[QuizAnswerEvent],
        catalog: &dyn QuestionCatalog,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let mut totals = Tally::default();
        let mut total_time_seconds = 0_u64;
        let mut topic_breakdown: BTreeMap<Topic, Tally> = BTreeMap::new();
        let mut difficulty_breakdown: BTreeMap<Difficulty, Tally> = BTreeMap::new();

        for event in events {
            totals.count(event.correct());
            total_time_seconds =
                total_time_seconds.saturating_add(u64::from(event.time_spent_seconds()));

            if let Some(question) = catalog.question(event.question_id()) {
                topic_breakdown
                    .entry(question.topic.clone())
                    .or_default()
                    .count(event.correct());
                difficulty_breakdown
                    .entry(question.difficulty)
                    .or_default()
                    .count(event.correct());
            }
        }

        Self {
            session_id,
            user_id,
            completed_at,
            total_questions: totals.total(),
            correct_answers: totals.correct(),
            total_time_seconds,
            topic_breakdown,
            difficulty_breakdown,
        }
    }

    /// Rehydrate a result from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `QuizResultError::CountMismatch` if counts do not align.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        session_id: SessionId,
        user_id: UserId,
        completed_at: DateTime<Utc>,
        total_questions: u32,
        correct_answers: u32,
        total_time_seconds: u64,
        topic_breakdown: BTreeMap<Topic, Tally>,
        difficulty_breakdown: BTreeMap<Difficulty, Tally>,
    ) -> Result<Self, QuizResultError> {
        if correct_answers > total_questions {
            return Err(QuizResultError::CountMismatch {
                correct: correct_answers,
                total: total_questions,
            });
        }

        Ok(Self {
            session_id,
            user_id,
            completed_at,
            total_questions,
            correct_answers,
            total_time_seconds,
            topic_breakdown,
            difficulty_breakdown,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    /// Session accuracy percentage, rounded half-up; 0 for an empty session.
    #[must_use]
    pub fn accuracy(&self) -> u32 {
        percentage(self.correct_answers, self.total_questions)
    }

    #[must_use]
    pub fn total_time_seconds(&self) -> u64 {
        self.total_time_seconds
    }

    /// Session time in whole minutes, rounded to nearest.
    #[must_use]
    pub fn total_time_minutes(&self) -> u32 {
        u32::try_from((self.total_time_seconds + 30) / 60).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn topic_breakdown(&self) -> &BTreeMap<Topic, Tally> {
        &self.topic_breakdown
    }

    #[must_use]
    pub fn difficulty_breakdown(&self) -> &BTreeMap<Difficulty, Tally> {
        &self.difficulty_breakdown
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Question, StaticCatalog};
    use crate::model::ids::QuestionId;
    use crate::time::fixed_now;

    fn catalog() -> StaticCatalog {
        let question = |id: u64, topic: &str, difficulty: Difficulty| Question {
            id: QuestionId::new(id),
            topic: Topic::new(topic).unwrap(),
            difficulty,
            prompt: String::new(),
            options: Vec::new(),
            correct_option: 0,
        };
        StaticCatalog::new(
            vec![
                question(1, "Energy", Difficulty::Beginner),
                question(2, "Energy", Difficulty::Advanced),
                question(3, "Forces", Difficulty::Beginner),
            ],
            Vec::new(),
        )
    }

    fn event(question: u64, correct: bool, seconds: i64) -> QuizAnswerEvent {
        QuizAnswerEvent::new(
            UserId::new(1),
            QuestionId::new(question),
            correct,
            seconds,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn percentage_rounds_half_up_and_handles_zero() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13); // 12.5 rounds up
        assert_eq!(percentage(7, 10), 70);
    }

    #[test]
    fn folds_events_into_breakdowns() {
        let events = vec![
            event(1, true, 30),
            event(2, false, 40),
            event(3, true, 20),
            event(1, true, 10),
        ];
        let result = QuizResult::from_events(
            SessionId::generate(),
            UserId::new(1),
            &events,
            &catalog(),
            fixed_now(),
        );

        assert_eq!(result.total_questions(), 4);
        assert_eq!(result.correct_answers(), 3);
        assert_eq!(result.accuracy(), 75);
        assert_eq!(result.total_time_seconds(), 100);
        assert_eq!(result.total_time_minutes(), 2);

        let energy = result.topic_breakdown()[&Topic::new("Energy").unwrap()];
        assert_eq!(energy.total(), 3);
        assert_eq!(energy.correct(), 2);
        assert_eq!(energy.accuracy(), 67);

        let beginner = result.difficulty_breakdown()[&Difficulty::Beginner];
        assert_eq!(beginner.total(), 3);
        assert_eq!(beginner.correct(), 3);
        assert_eq!(beginner.accuracy(), 100);
    }

    #[test]
    fn unknown_questions_count_in_totals_only() {
        let events = vec![event(99, true, 10)];
        let result = QuizResult::from_events(
            SessionId::generate(),
            UserId::new(1),
            &events,
            &catalog(),
            fixed_now(),
        );

        assert_eq!(result.total_questions(), 1);
        assert!(result.topic_breakdown().is_empty());
        assert!(result.difficulty_breakdown().is_empty());
    }

    #[test]
    fn empty_session_has_zero_accuracy() {
        let result = QuizResult::from_events(
            SessionId::generate(),
            UserId::new(1),
            &[],
            &catalog(),
            fixed_now(),
        );
        assert_eq!(result.total_questions(), 0);
        assert_eq!(result.accuracy(), 0);
    }

    #[test]
    fn persisted_counts_must_align() {
        let err = QuizResult::from_persisted(
            SessionId::generate(),
            UserId::new(1),
            fixed_now(),
            5,
            6,
            0,
            BTreeMap::new(),
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, QuizResultError::CountMismatch { .. }));
    }
}
