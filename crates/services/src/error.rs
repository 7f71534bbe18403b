//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use study_core::aggregator::AggregateError;
use study_core::model::{AnswerError, LessonId, ProgressError, SlideId};

/// Input rejected before any mutation is attempted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("time spent cannot be negative: {0}")]
    NegativeTimeSpent(i64),

    #[error("display name cannot be empty")]
    EmptyName,

    #[error("unknown lesson: {0}")]
    UnknownLesson(LessonId),

    #[error("slide {slide} does not belong to lesson {lesson}")]
    SlideNotInLesson { lesson: LessonId, slide: SlideId },
}

impl From<AnswerError> for ValidationError {
    fn from(err: AnswerError) -> Self {
        match err {
            AnswerError::NegativeTimeSpent(seconds) => Self::NegativeTimeSpent(seconds),
            // `AnswerError` is `#[non_exhaustive]`, so a wildcard arm is required
            // across the crate boundary even though every current variant is handled.
            _ => unreachable!("unhandled AnswerError variant"),
        }
    }
}

/// Errors emitted by `LearningService` commands and queries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Errors emitted by the sync coordinator and sync targets.
///
/// All variants are retryable and none corrupt local state; a failed
/// reconciliation leaves the pending backlog intact.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("remote rejected batch: {0}")]
    RemoteRejected(String),

    #[error("sync attempt timed out")]
    Timeout,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ExportService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid export data: {0}")]
    Invalid(String),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}
