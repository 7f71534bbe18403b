mod answer;
mod badge;
mod difficulty;
mod ids;
mod lesson;
mod progress;
mod quiz_result;
mod sync;
mod topic;

pub use answer::{AnswerError, QuizAnswerEvent};
pub use badge::{
    Badge, BadgeCriteria, BadgeError, BadgeId, BadgeKind, BadgeSpec, badge_catalog, evaluate,
};
pub use difficulty::{Difficulty, DifficultyError};
pub use ids::{EventId, LessonId, ParseIdError, QuestionId, SessionId, SlideId, UserId};
pub use lesson::{LessonProgress, LessonProgressError, SlideProgress};
pub use progress::{ProgressError, ProgressRecord};
pub use quiz_result::{QuizResult, QuizResultError, Tally, percentage};
pub use sync::SyncStatus;
pub use topic::{Topic, TopicError};
