use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::QuizAnswerEvent;
use crate::model::progress::ProgressRecord;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BadgeError {
    #[error("unknown badge id: {0}")]
    UnknownId(String),

    #[error("unknown badge kind: {0}")]
    UnknownKind(String),

    #[error("earned badge is missing its earned date")]
    MissingEarnedDate,

    #[error("unearned badge carries an earned date")]
    UnexpectedEarnedDate,
}

//
// ─── BADGE IDENTITY ───────────────────────────────────────────────────────────
//

/// Stable identifier for a badge, drawn from the fixed catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeId {
    FirstQuiz,
    QuizMaster,
    LessonComplete,
    StreakFive,
    SpeedDemon,
}

impl BadgeId {
    /// Stable string encoding used by storage and export.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BadgeId::FirstQuiz => "first-quiz",
            BadgeId::QuizMaster => "quiz-master",
            BadgeId::LessonComplete => "lesson-complete",
            BadgeId::StreakFive => "streak-5",
            BadgeId::SpeedDemon => "speed-demon",
        }
    }

    /// Decodes the stable string encoding.
    ///
    /// # Errors
    ///
    /// Returns `BadgeError::UnknownId` for ids outside the fixed catalog.
    pub fn parse(value: &str) -> Result<Self, BadgeError> {
        match value {
            "first-quiz" => Ok(Self::FirstQuiz),
            "quiz-master" => Ok(Self::QuizMaster),
            "lesson-complete" => Ok(Self::LessonComplete),
            "streak-5" => Ok(Self::StreakFive),
            "speed-demon" => Ok(Self::SpeedDemon),
            other => Err(BadgeError::UnknownId(other.to_string())),
        }
    }
}

impl std::fmt::Display for BadgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category a badge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeKind {
    Achievement,
    Progress,
    Mastery,
    Streak,
    Speed,
    Completion,
}

impl BadgeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BadgeKind::Achievement => "achievement",
            BadgeKind::Progress => "progress",
            BadgeKind::Mastery => "mastery",
            BadgeKind::Streak => "streak",
            BadgeKind::Speed => "speed",
            BadgeKind::Completion => "completion",
        }
    }

    /// Decodes the stable string encoding.
    ///
    /// # Errors
    ///
    /// Returns `BadgeError::UnknownKind` for unknown encodings.
    pub fn parse(value: &str) -> Result<Self, BadgeError> {
        match value {
            "achievement" => Ok(Self::Achievement),
            "progress" => Ok(Self::Progress),
            "mastery" => Ok(Self::Mastery),
            "streak" => Ok(Self::Streak),
            "speed" => Ok(Self::Speed),
            "completion" => Ok(Self::Completion),
            other => Err(BadgeError::UnknownKind(other.to_string())),
        }
    }
}

//
// ─── CRITERIA ─────────────────────────────────────────────────────────────────
//

/// What a badge requires, as a closed set of variants.
///
/// Each criterion carries its threshold so the evaluator is exhaustive-checked
/// at compile time instead of dispatching on criteria strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeCriteria {
    /// Total answered questions reaches the threshold.
    TotalQuestionsAtLeast(u32),
    /// Correct answers reach the threshold.
    CorrectAnswersAtLeast(u32),
    /// Completed lessons reach the threshold.
    LessonsCompletedAtLeast(u32),
    /// Consecutive active days reach the threshold.
    StreakDaysAtLeast(u32),
    /// `count` answers fall inside any sliding window of `window_minutes`.
    ///
    /// Judged from the answer event log, not the progress snapshot.
    AnswersWithinWindow { count: u32, window_minutes: i64 },
}

impl BadgeCriteria {
    fn is_met(self, progress: &ProgressRecord, events: &[QuizAnswerEvent]) -> bool {
        match self {
            BadgeCriteria::TotalQuestionsAtLeast(n) => progress.total_questions() >= n,
            BadgeCriteria::CorrectAnswersAtLeast(n) => progress.correct_answers() >= n,
            BadgeCriteria::LessonsCompletedAtLeast(n) => progress.completed_lessons_count() >= n,
            BadgeCriteria::StreakDaysAtLeast(n) => progress.streak_days() >= n,
            BadgeCriteria::AnswersWithinWindow {
                count,
                window_minutes,
            } => answers_within_window(events, count, Duration::minutes(window_minutes)),
        }
    }
}

/// True when any `count` consecutive events fit inside `window`.
fn answers_within_window(events: &[QuizAnswerEvent], count: u32, window: Duration) -> bool {
    let count = count as usize;
    if count == 0 || events.len() < count {
        return false;
    }

    let mut timestamps: Vec<DateTime<Utc>> = events.iter().map(QuizAnswerEvent::timestamp).collect();
    timestamps.sort_unstable();

    timestamps
        .windows(count)
        .any(|w| w[count - 1] - w[0] <= window)
}

//
// ─── CATALOG ──────────────────────────────────────────────────────────────────
//

/// Catalog entry: identity plus display copy and criteria.
#[derive(Debug, Clone, Copy)]
pub struct BadgeSpec {
    pub id: BadgeId,
    pub kind: BadgeKind,
    pub title: &'static str,
    pub description: &'static str,
    pub criteria: BadgeCriteria,
}

/// The fixed badge catalog, in insertion order.
///
/// Evaluation results preserve this order when several badges become eligible
/// from a single mutation.
#[must_use]
pub fn badge_catalog() -> &'static [BadgeSpec] {
    const CATALOG: [BadgeSpec; 5] = [
        BadgeSpec {
            id: BadgeId::FirstQuiz,
            kind: BadgeKind::Achievement,
            title: "First Steps",
            description: "Answer your first quiz question",
            criteria: BadgeCriteria::TotalQuestionsAtLeast(1),
        },
        BadgeSpec {
            id: BadgeId::QuizMaster,
            kind: BadgeKind::Mastery,
            title: "Quiz Master",
            description: "Answer 50 questions correctly",
            criteria: BadgeCriteria::CorrectAnswersAtLeast(50),
        },
        BadgeSpec {
            id: BadgeId::LessonComplete,
            kind: BadgeKind::Completion,
            title: "Lesson Learned",
            description: "Complete your first lesson",
            criteria: BadgeCriteria::LessonsCompletedAtLeast(1),
        },
        BadgeSpec {
            id: BadgeId::StreakFive,
            kind: BadgeKind::Streak,
            title: "On a Roll",
            description: "Keep a five-day learning streak",
            criteria: BadgeCriteria::StreakDaysAtLeast(5),
        },
        BadgeSpec {
            id: BadgeId::SpeedDemon,
            kind: BadgeKind::Speed,
            title: "Speed Demon",
            description: "Answer 10 questions within five minutes",
            criteria: BadgeCriteria::AnswersWithinWindow {
                count: 10,
                window_minutes: 5,
            },
        },
    ];
    &CATALOG
}

//
// ─── BADGE ────────────────────────────────────────────────────────────────────
//

/// A persistent achievement flag with a one-way earned transition.
///
/// Once `earned` is true the flag never resets and `earned_date` is never
/// overwritten. Badges are owned by the progress record they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    id: BadgeId,
    kind: BadgeKind,
    title: String,
    description: String,
    earned: bool,
    earned_date: Option<DateTime<Utc>>,
}

impl Badge {
    /// Build an earned badge from its catalog entry.
    #[must_use]
    pub fn earned_from_spec(spec: &BadgeSpec, earned_date: DateTime<Utc>) -> Self {
        Self {
            id: spec.id,
            kind: spec.kind,
            title: spec.title.to_string(),
            description: spec.description.to_string(),
            earned: true,
            earned_date: Some(earned_date),
        }
    }

    /// Rehydrate a badge from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `BadgeError` when the earned flag and earned date disagree.
    pub fn from_persisted(
        id: BadgeId,
        kind: BadgeKind,
        title: String,
        description: String,
        earned: bool,
        earned_date: Option<DateTime<Utc>>,
    ) -> Result<Self, BadgeError> {
        if earned && earned_date.is_none() {
            return Err(BadgeError::MissingEarnedDate);
        }
        if !earned && earned_date.is_some() {
            return Err(BadgeError::UnexpectedEarnedDate);
        }

        Ok(Self {
            id,
            kind,
            title,
            description,
            earned,
            earned_date,
        })
    }

    #[must_use]
    pub fn id(&self) -> BadgeId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> BadgeKind {
        self.kind
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn earned(&self) -> bool {
        self.earned
    }

    #[must_use]
    pub fn earned_date(&self) -> Option<DateTime<Utc>> {
        self.earned_date
    }
}

//
// ─── EVALUATOR ────────────────────────────────────────────────────────────────
//

/// Returns badges whose criteria now hold and which the record has not earned.
///
/// Pure function of its inputs: no side effects, deterministic, and safe to
/// re-run after a crash between evaluation and persistence. The caller is
/// responsible for merging the returned badges into the progress record and
/// persisting it in the same logical step as the qualifying mutation; once
/// merged, a second call with the same state returns nothing.
#[must_use]
pub fn evaluate(
    progress: &ProgressRecord,
    events: &[QuizAnswerEvent],
    now: DateTime<Utc>,
) -> Vec<Badge> {
    badge_catalog()
        .iter()
        .filter(|spec| !progress.has_earned(spec.id))
        .filter(|spec| spec.criteria.is_met(progress, events))
        .map(|spec| Badge::earned_from_spec(spec, now))
        .collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
