use thiserror::Error;

use crate::model::{
    AnswerError, BadgeError, LessonProgressError, ProgressError, QuizResultError, TopicError,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Badge(#[from] BadgeError),
    #[error(transparent)]
    LessonProgress(#[from] LessonProgressError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    QuizResult(#[from] QuizResultError),
    #[error(transparent)]
    Topic(#[from] TopicError),
}
