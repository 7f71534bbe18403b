use crate::model::{Difficulty, LessonId, QuestionId, SlideId, Topic};

//
// ─── CATALOG TYPES ─────────────────────────────────────────────────────────────
//

/// A single quiz question from the static content catalog.
///
/// Catalog content is authored outside this subsystem and treated as
/// read-only; questions are looked up by id or filtered by difficulty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub topic: Topic,
    pub difficulty: Difficulty,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
}

/// A lesson and its ordered slides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    pub slides: Vec<SlideId>,
}

impl Lesson {
    /// Returns true when `slide_id` belongs to this lesson.
    #[must_use]
    pub fn contains_slide(&self, slide_id: SlideId) -> bool {
        self.slides.contains(&slide_id)
    }
}

//
// ─── CATALOG CONTRACTS ─────────────────────────────────────────────────────────
//

/// Read-only access to the question catalog.
pub trait QuestionCatalog: Send + Sync {
    /// Look up a question by id.
    fn question(&self, id: QuestionId) -> Option<&Question>;

    /// All questions in the given difficulty tier, in catalog order.
    fn questions_with_difficulty(&self, difficulty: Difficulty) -> Vec<&Question>;
}

/// Read-only access to the lesson catalog.
pub trait LessonCatalog: Send + Sync {
    /// Look up a lesson by id.
    fn lesson(&self, id: LessonId) -> Option<&Lesson>;

    /// Total number of lessons in the catalog.
    fn lesson_count(&self) -> u32;
}

//
// ─── STATIC CATALOG ────────────────────────────────────────────────────────────
//

/// In-memory catalog backed by plain vectors.
///
/// Used by tests and by the demo binary; a real deployment supplies its own
/// catalog implementation.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    questions: Vec<Question>,
    lessons: Vec<Lesson>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new(questions: Vec<Question>, lessons: Vec<Lesson>) -> Self {
        Self { questions, lessons }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }
}

impl QuestionCatalog for StaticCatalog {
    fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    fn questions_with_difficulty(&self, difficulty: Difficulty) -> Vec<&Question> {
        self.questions
            .iter()
            .filter(|q| q.difficulty == difficulty)
            .collect()
    }
}

impl LessonCatalog for StaticCatalog {
    fn lesson(&self, id: LessonId) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == id)
    }

    fn lesson_count(&self) -> u32 {
        u32::try_from(self.lessons.len()).unwrap_or(u32::MAX)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: u64, topic: &str, difficulty: Difficulty) -> Question {
        Question {
            id: QuestionId::new(id),
            topic: Topic::new(topic).unwrap(),
            difficulty,
            prompt: format!("Question {id}?"),
            options: vec!["a".into(), "b".into()],
            correct_option: 0,
        }
    }

    #[test]
    fn lookup_by_id_and_difficulty() {
        let catalog = StaticCatalog::new(
            vec![
                question(1, "Energy", Difficulty::Beginner),
                question(2, "Forces", Difficulty::Advanced),
                question(3, "Energy", Difficulty::Advanced),
            ],
            Vec::new(),
        );

        assert_eq!(
            catalog.question(QuestionId::new(2)).map(|q| q.id),
            Some(QuestionId::new(2))
        );
        let advanced = catalog.questions_with_difficulty(Difficulty::Advanced);
        assert_eq!(advanced.len(), 2);
        assert!(advanced.iter().all(|q| q.difficulty == Difficulty::Advanced));
    }

    #[test]
    fn lesson_lookup_and_count() {
        let lesson = Lesson {
            id: LessonId::new(1),
            title: "Intro".into(),
            slides: vec![SlideId::new(1), SlideId::new(2)],
        };
        let catalog = StaticCatalog::new(Vec::new(), vec![lesson]);

        assert_eq!(catalog.lesson_count(), 1);
        assert!(catalog.lesson(LessonId::new(1)).unwrap().contains_slide(SlideId::new(2)));
        assert!(catalog.lesson(LessonId::new(9)).is_none());
    }
}
