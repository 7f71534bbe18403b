use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::catalog::QuestionCatalog;
use crate::model::{QuizAnswerEvent, QuizResult, SessionId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AggregateError {
    #[error("session window expects {expected} events, got {actual}")]
    WrongBatchSize { expected: usize, actual: usize },
}

/// Fixed-size session boundary over the answer event log.
///
/// A session is a batch of `batch_size` consecutive events; boundaries are
/// derived from the persistent event ordering, so each event folds into
/// exactly one result even across process restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    batch_size: usize,
}

impl SessionWindow {
    pub const DEFAULT_BATCH_SIZE: usize = 10;

    /// Window with a custom batch size (clamped to at least 1).
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// True when an event log of `event_count` entries just closed a session.
    #[must_use]
    pub fn is_boundary(&self, event_count: usize) -> bool {
        event_count > 0 && event_count % self.batch_size == 0
    }
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BATCH_SIZE)
    }
}

/// Rolls one session's worth of answer events into a quiz result.
///
/// The slice must hold exactly one window of events; the completion time is
/// the timestamp of the batch's last event, keeping aggregation a pure
/// function of the log.
///
/// # Errors
///
/// Returns `AggregateError::WrongBatchSize` if the slice does not match the
/// window's batch size.
pub fn aggregate(
    session_id: SessionId,
    user_id: UserId,
    events: &[QuizAnswerEvent],
    window: &SessionWindow,
    catalog: &dyn QuestionCatalog,
) -> Result<QuizResult, AggregateError> {
    if events.len() != window.batch_size() {
        return Err(AggregateError::WrongBatchSize {
            expected: window.batch_size(),
            actual: events.len(),
        });
    }

    let completed_at: DateTime<Utc> = events
        .iter()
        .map(QuizAnswerEvent::timestamp)
        .max()
        .unwrap_or_else(Utc::now);

    Ok(QuizResult::from_events(
        session_id, user_id, events, catalog, completed_at,
    ))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
