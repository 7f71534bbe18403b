use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{EventId, QuestionId, UserId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Validation errors raised before an answer event is accepted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("time spent cannot be negative: {0}")]
    NegativeTimeSpent(i64),
}

//
// ─── QUIZ ANSWER EVENT ────────────────────────────────────────────────────────
//

/// Record of a single answered quiz question.
///
/// This is the append-only log of record: events are never mutated or deleted
/// once written, and every aggregate (progress counters, quiz results) can be
/// rebuilt by replaying them. The id is assigned by the store on append and
/// is `None` until then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAnswerEvent {
    id: Option<EventId>,
    user_id: UserId,
    question_id: QuestionId,
    correct: bool,
    time_spent_seconds: u32,
    timestamp: DateTime<Utc>,
}

impl QuizAnswerEvent {
    /// Build a new, not-yet-persisted answer event.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::NegativeTimeSpent` if `time_spent_seconds` is
    /// below zero.
    pub fn new(
        user_id: UserId,
        question_id: QuestionId,
        correct: bool,
        time_spent_seconds: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, AnswerError> {
        let seconds = u32::try_from(time_spent_seconds)
            .map_err(|_| AnswerError::NegativeTimeSpent(time_spent_seconds))?;

        Ok(Self {
            id: None,
            user_id,
            question_id,
            correct,
            time_spent_seconds: seconds,
            timestamp,
        })
    }

    /// Rehydrate an event from persisted storage with its assigned id.
    #[must_use]
    pub fn from_persisted(
        id: EventId,
        user_id: UserId,
        question_id: QuestionId,
        correct: bool,
        time_spent_seconds: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            user_id,
            question_id,
            correct,
            time_spent_seconds,
            timestamp,
        }
    }

    /// Returns a copy of this event carrying the store-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn id(&self) -> Option<EventId> {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn correct(&self) -> bool {
        self.correct
    }

    #[must_use]
    pub fn time_spent_seconds(&self) -> u32 {
        self.time_spent_seconds
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn event_creation_works() {
        let event = QuizAnswerEvent::new(
            UserId::new(1),
            QuestionId::new(10),
            true,
            30,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(event.question_id(), QuestionId::new(10));
        assert!(event.correct());
        assert_eq!(event.time_spent_seconds(), 30);
        assert_eq!(event.id(), None);
    }

    #[test]
    fn negative_time_is_rejected() {
        let err =
            QuizAnswerEvent::new(UserId::new(1), QuestionId::new(10), true, -5, fixed_now())
                .unwrap_err();
        assert!(matches!(err, AnswerError::NegativeTimeSpent(-5)));
    }

    #[test]
    fn with_id_attaches_store_id() {
        let event =
            QuizAnswerEvent::new(UserId::new(1), QuestionId::new(2), false, 12, fixed_now())
                .unwrap()
                .with_id(EventId::new(99));
        assert_eq!(event.id(), Some(EventId::new(99)));
    }
}
