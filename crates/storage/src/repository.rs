use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use study_core::model::{
    EventId, LessonId, LessonProgress, ProgressRecord, QuizAnswerEvent, QuizResult, SessionId,
    SyncStatus, UserId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A caller required an entity that is absent.
    ///
    /// Plain `get` operations return `Ok(None)` for missing keys; this
    /// variant exists for call sites that cannot proceed without the entity.
    #[error("not found")]
    NotFound,

    /// Append of a quiz answer event whose id is already stored.
    #[error("duplicate event id")]
    DuplicateEvent,

    /// Storage-medium failure (disk, connection, quota). Fatal to the
    /// triggering command; propagated, not retried here.
    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Repository for the singleton progress record (badges included).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the progress record for a learner; `None` if never created.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage-medium failures.
    async fn get_progress(&self, user_id: UserId) -> Result<Option<ProgressRecord>, StorageError>;

    /// Persist or update the progress record atomically, badges included.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_progress(&self, progress: &ProgressRecord) -> Result<(), StorageError>;
}

/// Repository for per-lesson progress records.
#[async_trait]
pub trait LessonProgressRepository: Send + Sync {
    /// Fetch one lesson's progress; `None` before the first slide view.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage-medium failures.
    async fn get_lesson_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError>;

    /// Persist or update one lesson's progress atomically, slides included.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_lesson_progress(&self, progress: &LessonProgress) -> Result<(), StorageError>;

    /// All lesson progress for a learner, ordered by lesson id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage-medium failures.
    async fn list_lesson_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<LessonProgress>, StorageError>;
}

/// Append-only repository for the quiz answer event log.
#[async_trait]
pub trait AnswerEventRepository: Send + Sync {
    /// Append an event and return its assigned id.
    ///
    /// An event that already carries an id keeps it (import path); the store
    /// assigns the next id otherwise.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::DuplicateEvent` if the carried id is already
    /// stored, or other storage errors.
    async fn append_event(&self, event: &QuizAnswerEvent) -> Result<EventId, StorageError>;

    /// Full event log for a learner in append order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage-medium failures.
    async fn list_events(&self, user_id: UserId) -> Result<Vec<QuizAnswerEvent>, StorageError>;

    /// Number of events logged for a learner.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage-medium failures.
    async fn count_events(&self, user_id: UserId) -> Result<u64, StorageError>;
}

/// Repository for immutable per-session quiz results.
#[async_trait]
pub trait QuizResultRepository: Send + Sync {
    /// Persist a freshly aggregated result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the result cannot be stored.
    async fn append_result(&self, result: &QuizResult) -> Result<(), StorageError>;

    /// Fetch one result by session id; `None` if unknown.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage-medium failures.
    async fn get_result(&self, session_id: SessionId)
    -> Result<Option<QuizResult>, StorageError>;

    /// All results for a learner, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage-medium failures.
    async fn list_results(&self, user_id: UserId) -> Result<Vec<QuizResult>, StorageError>;
}

/// Repository for the singleton sync status record.
#[async_trait]
pub trait SyncStatusRepository: Send + Sync {
    /// Fetch the sync status; `None` before first persistence.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage-medium failures.
    async fn get_sync_status(&self) -> Result<Option<SyncStatus>, StorageError>;

    /// Persist or update the sync status.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_sync_status(&self, status: &SyncStatus) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY STORE ───────────────────────────────────────────────────────────
//

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    progress: Arc<Mutex<HashMap<UserId, ProgressRecord>>>,
    lessons: Arc<Mutex<HashMap<(UserId, LessonId), LessonProgress>>>,
    events: Arc<Mutex<Vec<QuizAnswerEvent>>>,
    next_event_id: Arc<Mutex<u64>>,
    results: Arc<Mutex<Vec<QuizResult>>>,
    sync_status: Arc<Mutex<Option<SyncStatus>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Io(e.to_string())
}

#[async_trait]
impl ProgressRepository for InMemoryStore {
    async fn get_progress(&self, user_id: UserId) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(lock_err)?;
        Ok(guard.get(&user_id).cloned())
    }

    async fn upsert_progress(&self, progress: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(lock_err)?;
        guard.insert(progress.user_id(), progress.clone());
        Ok(())
    }
}

#[async_trait]
impl LessonProgressRepository for InMemoryStore {
    async fn get_lesson_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let guard = self.lessons.lock().map_err(lock_err)?;
        Ok(guard.get(&(user_id, lesson_id)).cloned())
    }

    async fn upsert_lesson_progress(&self, progress: &LessonProgress) -> Result<(), StorageError> {
        let mut guard = self.lessons.lock().map_err(lock_err)?;
        guard.insert((progress.user_id(), progress.lesson_id()), progress.clone());
        Ok(())
    }

    async fn list_lesson_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let guard = self.lessons.lock().map_err(lock_err)?;
        let mut out: Vec<LessonProgress> = guard
            .values()
            .filter(|p| p.user_id() == user_id)
            .cloned()
            .collect();
        out.sort_by_key(LessonProgress::lesson_id);
        Ok(out)
    }
}

#[async_trait]
impl AnswerEventRepository for InMemoryStore {
    async fn append_event(&self, event: &QuizAnswerEvent) -> Result<EventId, StorageError> {
        let mut events = self.events.lock().map_err(lock_err)?;
        let mut next_id = self.next_event_id.lock().map_err(lock_err)?;

        let id = match event.id() {
            Some(id) => {
                if events.iter().any(|e| e.id() == Some(id)) {
                    return Err(StorageError::DuplicateEvent);
                }
                *next_id = (*next_id).max(id.value() + 1);
                id
            }
            None => {
                *next_id += 1;
                EventId::new(*next_id)
            }
        };

        events.push(event.clone().with_id(id));
        Ok(id)
    }

    async fn list_events(&self, user_id: UserId) -> Result<Vec<QuizAnswerEvent>, StorageError> {
        let events = self.events.lock().map_err(lock_err)?;
        let mut out: Vec<QuizAnswerEvent> = events
            .iter()
            .filter(|e| e.user_id() == user_id)
            .cloned()
            .collect();
        out.sort_by_key(QuizAnswerEvent::id);
        Ok(out)
    }

    async fn count_events(&self, user_id: UserId) -> Result<u64, StorageError> {
        let events = self.events.lock().map_err(lock_err)?;
        Ok(events.iter().filter(|e| e.user_id() == user_id).count() as u64)
    }
}

#[async_trait]
impl QuizResultRepository for InMemoryStore {
    async fn append_result(&self, result: &QuizResult) -> Result<(), StorageError> {
        let mut results = self.results.lock().map_err(lock_err)?;
        results.push(result.clone());
        Ok(())
    }

    async fn get_result(
        &self,
        session_id: SessionId,
    ) -> Result<Option<QuizResult>, StorageError> {
        let results = self.results.lock().map_err(lock_err)?;
        Ok(results.iter().find(|r| r.session_id() == session_id).cloned())
    }

    async fn list_results(&self, user_id: UserId) -> Result<Vec<QuizResult>, StorageError> {
        let results = self.results.lock().map_err(lock_err)?;
        let mut out: Vec<QuizResult> = results
            .iter()
            .filter(|r| r.user_id() == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.completed_at().cmp(&a.completed_at()));
        Ok(out)
    }
}

#[async_trait]
impl SyncStatusRepository for InMemoryStore {
    async fn get_sync_status(&self) -> Result<Option<SyncStatus>, StorageError> {
        let guard = self.sync_status.lock().map_err(lock_err)?;
        Ok(guard.clone())
    }

    async fn upsert_sync_status(&self, status: &SyncStatus) -> Result<(), StorageError> {
        let mut guard = self.sync_status.lock().map_err(lock_err)?;
        *guard = Some(status.clone());
        Ok(())
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the entity repositories behind trait objects for backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub lessons: Arc<dyn LessonProgressRepository>,
    pub events: Arc<dyn AnswerEventRepository>,
    pub results: Arc<dyn QuizResultRepository>,
    pub sync_status: Arc<dyn SyncStatusRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let store = InMemoryStore::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(store.clone());
        let lessons: Arc<dyn LessonProgressRepository> = Arc::new(store.clone());
        let events: Arc<dyn AnswerEventRepository> = Arc::new(store.clone());
        let results: Arc<dyn QuizResultRepository> = Arc::new(store.clone());
        let sync_status: Arc<dyn SyncStatusRepository> = Arc::new(store);
        Self {
            progress,
            lessons,
            events,
            results,
            sync_status,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
