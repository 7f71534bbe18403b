use std::collections::HashSet;
use std::sync::Arc;

use services::error::{CommandError, ValidationError};
use services::{AppServices, ExportService};
use storage::repository::Storage;
use study_core::catalog::{Lesson, Question, StaticCatalog};
use study_core::model::{
    BadgeId, Difficulty, LessonId, QuestionId, SlideId, Topic, UserId,
};
use study_core::time::fixed_clock;

fn question(id: u64, topic: &str, difficulty: Difficulty) -> Question {
    Question {
        id: QuestionId::new(id),
        topic: Topic::new(topic).unwrap(),
        difficulty,
        prompt: format!("Question {id}?"),
        options: vec!["a".into(), "b".into(), "c".into()],
        correct_option: 0,
    }
}

fn catalog() -> StaticCatalog {
    StaticCatalog::new(
        vec![
            question(1, "Energy", Difficulty::Beginner),
            question(2, "Forces", Difficulty::Beginner),
            question(3, "Energy", Difficulty::Intermediate),
            question(4, "Waves", Difficulty::Intermediate),
            question(5, "Energy", Difficulty::Advanced),
            question(6, "Forces", Difficulty::Advanced),
        ],
        vec![
            Lesson {
                id: LessonId::new(1),
                title: "Getting Started".into(),
                slides: vec![SlideId::new(1), SlideId::new(2)],
            },
            Lesson {
                id: LessonId::new(2),
                title: "Energy Basics".into(),
                slides: vec![SlideId::new(3)],
            },
        ],
    )
}

async fn app() -> AppServices {
    let shared = Arc::new(catalog());
    AppServices::with_storage(
        Storage::in_memory(),
        fixed_clock(),
        UserId::new(1),
        shared.clone(),
        shared,
        None,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn fifty_correct_answers_earn_quiz_master_exactly_once() {
    let app = app().await;
    let learning = app.learning();

    let mut quiz_master_awards = Vec::new();
    for i in 1..=60_u32 {
        let outcome = learning
            .submit_answer(QuestionId::new(1), true, 12)
            .await
            .unwrap();

        // Counter invariant holds after every call.
        assert!(outcome.progress.correct_answers() <= outcome.progress.total_questions());

        if outcome
            .new_badges
            .iter()
            .any(|b| b.id() == BadgeId::QuizMaster)
        {
            quiz_master_awards.push(i);
        }
    }

    assert_eq!(quiz_master_awards, vec![50]);

    let progress = learning.get_progress().await.unwrap();
    assert_eq!(progress.total_questions(), 60);
    assert_eq!(progress.correct_answers(), 60);
    assert!(progress.has_earned(BadgeId::QuizMaster));
    assert!(progress.has_earned(BadgeId::FirstQuiz));
}

#[tokio::test]
async fn every_tenth_answer_closes_a_session() {
    let app = app().await;
    let learning = app.learning();

    for i in 1..=25_u32 {
        let correct = i % 2 == 0;
        let outcome = learning
            .submit_answer(QuestionId::new(1), correct, 30)
            .await
            .unwrap();

        if i % 10 == 0 {
            let result = outcome.quiz_result.expect("boundary should emit a result");
            assert_eq!(result.total_questions(), 10);
            assert_eq!(result.accuracy(), 50);
        } else {
            assert!(outcome.quiz_result.is_none());
        }
    }

    let results = learning.get_quiz_results().await.unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn rejected_input_leaves_no_state_change() {
    let app = app().await;
    let learning = app.learning();
    learning
        .submit_answer(QuestionId::new(1), true, 10)
        .await
        .unwrap();
    let before_events = 1;

    let err = learning
        .submit_answer(QuestionId::new(1), true, -3)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CommandError::Validation(ValidationError::NegativeTimeSpent(-3))
    ));

    let err = learning.rename_user("   ").await.unwrap_err();
    assert!(matches!(
        err,
        CommandError::Validation(ValidationError::EmptyName)
    ));

    let progress = learning.get_progress().await.unwrap();
    assert_eq!(progress.total_questions(), before_events);
    assert_eq!(progress.display_name(), "Learner");
}

#[tokio::test]
async fn lesson_slides_complete_the_lesson_once() {
    let app = app().await;
    let learning = app.learning();

    let outcome = learning
        .complete_lesson_slide(LessonId::new(1), SlideId::new(1), 40)
        .await
        .unwrap();
    assert_eq!(outcome.progress.completed_lessons_count(), 0);
    assert!(outcome.new_badges.is_empty());

    let outcome = learning
        .complete_lesson_slide(LessonId::new(1), SlideId::new(2), 25)
        .await
        .unwrap();
    assert_eq!(outcome.progress.completed_lessons_count(), 1);
    assert!(
        outcome
            .new_badges
            .iter()
            .any(|b| b.id() == BadgeId::LessonComplete)
    );

    // Re-viewing a slide accumulates time but never re-completes.
    let outcome = learning
        .complete_lesson_slide(LessonId::new(1), SlideId::new(1), 10)
        .await
        .unwrap();
    assert_eq!(outcome.progress.completed_lessons_count(), 1);
    assert!(outcome.new_badges.is_empty());
}

#[tokio::test]
async fn foreign_slides_and_unknown_lessons_are_rejected() {
    let app = app().await;
    let learning = app.learning();

    let err = learning
        .complete_lesson_slide(LessonId::new(9), SlideId::new(1), 10)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CommandError::Validation(ValidationError::UnknownLesson(_))
    ));

    let err = learning
        .complete_lesson_slide(LessonId::new(1), SlideId::new(3), 10)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CommandError::Validation(ValidationError::SlideNotInLesson { .. })
    ));
}

#[tokio::test]
async fn adaptive_pool_follows_accuracy_and_mastery() {
    let app = app().await;
    let learning = app.learning();

    let advanced = learning.get_adaptive_questions(85.0, &HashSet::new());
    assert_eq!(advanced.len(), 2);
    assert!(advanced.iter().all(|q| q.difficulty == Difficulty::Advanced));

    let mastered: HashSet<Topic> = [Topic::new("Energy").unwrap()].into();
    let filtered = learning.get_adaptive_questions(85.0, &mastered);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, QuestionId::new(6));
}

#[tokio::test]
async fn export_round_trips_into_a_fresh_store() {
    let app = app().await;
    let learning = app.learning();

    for _ in 0..12 {
        learning
            .submit_answer(QuestionId::new(2), true, 15)
            .await
            .unwrap();
    }
    learning
        .complete_lesson_slide(LessonId::new(2), SlideId::new(3), 50)
        .await
        .unwrap();
    learning.rename_user("Ada").await.unwrap();

    let export = app.exporter().export().await.unwrap();
    let json = ExportService::to_json(&export).unwrap();
    let parsed = ExportService::from_json(&json).unwrap();

    let restored_storage = Storage::in_memory();
    let restorer = ExportService::new(
        fixed_clock(),
        UserId::new(1),
        Arc::clone(&restored_storage.progress),
        Arc::clone(&restored_storage.lessons),
        Arc::clone(&restored_storage.events),
    );
    restorer.import(&parsed).await.unwrap();

    let restored = restored_storage
        .progress
        .get_progress(UserId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.display_name(), "Ada");
    assert_eq!(restored.total_questions(), 12);
    assert_eq!(restored.completed_lessons_count(), 1);

    let events = restored_storage
        .events
        .list_events(UserId::new(1))
        .await
        .unwrap();
    assert_eq!(events.len(), 12);
}

#[tokio::test]
async fn commands_keep_sync_accounting() {
    let app = app().await;
    let learning = app.learning();
    let sync = app.sync();

    let baseline = sync.status().await.unwrap().pending_change_count();

    // One answer commits an event append and a progress upsert.
    learning
        .submit_answer(QuestionId::new(1), true, 10)
        .await
        .unwrap();
    let status = sync.status().await.unwrap();
    assert_eq!(status.pending_change_count(), baseline + 2);
}
