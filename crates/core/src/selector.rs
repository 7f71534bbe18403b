use std::collections::HashSet;

use crate::catalog::{Question, QuestionCatalog};
use crate::model::{Difficulty, Topic};

/// Picks the question pool for the next quiz.
///
/// Rolling accuracy chooses the difficulty tier, then questions whose topic
/// the learner has already mastered are excluded. A pure read over the
/// catalog: nothing stored is mutated, and the same inputs always produce
/// the same pool. An empty result is a valid outcome (every question in the
/// tier was mastered); falling back is the caller's concern.
#[must_use]
pub fn select_questions(
    catalog: &dyn QuestionCatalog,
    accuracy: f64,
    mastered_topics: &HashSet<Topic>,
) -> Vec<Question> {
    let tier = Difficulty::for_accuracy(accuracy);
    catalog
        .questions_with_difficulty(tier)
        .into_iter()
        .filter(|q| !mastered_topics.contains(&q.topic))
        .cloned()
        .collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::model::QuestionId;

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
                question(1, "Energy", Difficulty::Advanced),
                question(2, "Forces", Difficulty::Advanced),
                question(3, "Energy", Difficulty::Beginner),
                question(4, "Waves", Difficulty::Intermediate),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn high_accuracy_selects_only_advanced() {
        let pool = select_questions(&catalog(), 85.0, &HashSet::new());
        assert_eq!(pool.len(), 2);
        assert!(pool.iter().all(|q| q.difficulty == Difficulty::Advanced));
    }

    #[test]
    fn mastered_topics_are_excluded() {
        let mastered: HashSet<Topic> = [Topic::new("Energy").unwrap()].into();
        let pool = select_questions(&catalog(), 85.0, &mastered);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, QuestionId::new(2));
    }

    #[test]
    fn full_mastery_yields_empty_pool() {
        let mastered: HashSet<Topic> = [
            Topic::new("Energy").unwrap(),
            Topic::new("Forces").unwrap(),
        ]
        .into();
        assert!(select_questions(&catalog(), 85.0, &mastered).is_empty());
    }

    #[test]
    fn fresh_learner_lands_in_beginner() {
        let pool = select_questions(&catalog(), 0.0, &HashSet::new());
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].difficulty, Difficulty::Beginner);
    }

    #[test]
    fn tier_boundaries_route_to_intermediate() {
        let pool = select_questions(&catalog(), 60.0, &HashSet::new());
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, QuestionId::new(4));
    }
}
