use std::collections::BTreeMap;

use chrono::Duration;
use storage::repository::{
    AnswerEventRepository, LessonProgressRepository, ProgressRepository, QuizResultRepository,
    StorageError, SyncStatusRepository,
};
use storage::sqlite::SqliteStore;
use study_core::model::{
    Badge, Difficulty, LessonId, LessonProgress, ProgressRecord, QuestionId, QuizAnswerEvent,
    QuizResult, SessionId, SlideId, SyncStatus, Tally, Topic, UserId, badge_catalog,
};
use study_core::time::fixed_now;

async fn open(name: &str) -> SqliteStore {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let store = SqliteStore::connect(&url).await.expect("connect");
    store.migrate().await.expect("migrate");
    store
}

fn build_event(question: u64, correct: bool) -> QuizAnswerEvent {
    QuizAnswerEvent::new(
        UserId::new(1),
        QuestionId::new(question),
        correct,
        20,
        fixed_now(),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_round_trips_progress_with_badges() {
    let store = open("memdb_progress").await;

    let mut progress = ProgressRecord::new(UserId::new(1), "Ada", 12);
    progress.record_answer(true, 30, fixed_now());
    progress.record_answer(false, 45, fixed_now());
    progress.advance_question_index(8);
    progress.record_login(fixed_now());
    progress.merge_badges(vec![Badge::earned_from_spec(
        &badge_catalog()[0],
        fixed_now(),
    )]);

    store.upsert_progress(&progress).await.unwrap();

    let fetched = store.get_progress(UserId::new(1)).await.unwrap().unwrap();
    assert_eq!(fetched, progress);
    assert_eq!(fetched.badges().len(), 1);
    assert!(fetched.badges()[0].earned());

    // Upsert again after more activity; badges survive the rewrite.
    let mut updated = fetched;
    updated.record_answer(true, 10, fixed_now() + Duration::days(1));
    store.upsert_progress(&updated).await.unwrap();

    let fetched = store.get_progress(UserId::new(1)).await.unwrap().unwrap();
    assert_eq!(fetched.total_questions(), 3);
    assert_eq!(fetched.streak_days(), 2);
    assert_eq!(fetched.badges().len(), 1);
}

#[tokio::test]
async fn sqlite_missing_progress_is_none() {
    let store = open("memdb_missing").await;
    assert!(store.get_progress(UserId::new(9)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_appends_events_and_rejects_duplicates() {
    let store = open("memdb_events").await;

    let first = store.append_event(&build_event(1, true)).await.unwrap();
    let second = store.append_event(&build_event(2, false)).await.unwrap();
    assert!(second.value() > first.value());

    let log = store.list_events(UserId::new(1)).await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].id(), Some(first));
    assert_eq!(log[0].question_id(), QuestionId::new(1));
    assert_eq!(store.count_events(UserId::new(1)).await.unwrap(), 2);

    let replay = build_event(3, true).with_id(first);
    let err = store.append_event(&replay).await.unwrap_err();
    assert!(matches!(err, StorageError::DuplicateEvent));
    assert_eq!(store.count_events(UserId::new(1)).await.unwrap(), 2);
}

#[tokio::test]
async fn sqlite_preserves_imported_event_ids() {
    let store = open("memdb_import").await;

    let imported = build_event(1, true).with_id(study_core::model::EventId::new(41));
    let id = store.append_event(&imported).await.unwrap();
    assert_eq!(id.value(), 41);

    // The next store-assigned id continues past the imported one.
    let next = store.append_event(&build_event(2, true)).await.unwrap();
    assert!(next.value() > 41);
}

#[tokio::test]
async fn sqlite_round_trips_quiz_results() {
    let store = open("memdb_results").await;

    let mut topics = BTreeMap::new();
    topics.insert(Topic::new("Energy").unwrap(), Tally::new(6, 4));
    topics.insert(Topic::new("Forces").unwrap(), Tally::new(4, 4));
    let mut difficulties = BTreeMap::new();
    difficulties.insert(Difficulty::Beginner, Tally::new(10, 8));

    let result = QuizResult::from_persisted(
        SessionId::generate(),
        UserId::new(1),
        fixed_now(),
        10,
        8,
        600,
        topics,
        difficulties,
    )
    .unwrap();

    store.append_result(&result).await.unwrap();

    let fetched = store
        .get_result(result.session_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched, result);
    assert_eq!(fetched.accuracy(), 80);

    let listed = store.list_results(UserId::new(1)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(
        store
            .get_result(SessionId::generate())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn sqlite_round_trips_lesson_progress() {
    let store = open("memdb_lessons").await;

    let mut lesson = LessonProgress::new(UserId::new(1), LessonId::new(3));
    lesson.record_slide_view(SlideId::new(1), 30);
    lesson.record_slide_view(SlideId::new(2), 45);
    lesson.complete(fixed_now());

    store.upsert_lesson_progress(&lesson).await.unwrap();

    let fetched = store
        .get_lesson_progress(UserId::new(1), LessonId::new(3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched, lesson);
    assert!(fetched.completed());
    assert_eq!(fetched.slides().len(), 2);
    assert_eq!(fetched.slides()[0].slide_id(), SlideId::new(1));

    let listed = store.list_lesson_progress(UserId::new(1)).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn sqlite_round_trips_sync_status() {
    let store = open("memdb_sync").await;
    assert!(store.get_sync_status().await.unwrap().is_none());

    let mut status = SyncStatus::new(true);
    status.record_pending_change();
    status.record_pending_change();
    store.upsert_sync_status(&status).await.unwrap();

    let fetched = store.get_sync_status().await.unwrap().unwrap();
    assert_eq!(fetched.pending_change_count(), 2);
    assert!(fetched.cloud_enabled());
    assert!(fetched.last_sync_timestamp().is_none());

    status.mark_synced(fixed_now());
    store.upsert_sync_status(&status).await.unwrap();

    let fetched = store.get_sync_status().await.unwrap().unwrap();
    assert_eq!(fetched.pending_change_count(), 0);
    assert_eq!(fetched.last_sync_timestamp(), Some(fixed_now()));
}
