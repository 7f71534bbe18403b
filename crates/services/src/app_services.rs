use std::sync::Arc;

use storage::repository::Storage;
use study_core::Clock;
use study_core::catalog::{LessonCatalog, QuestionCatalog};
use study_core::model::{ProgressRecord, UserId};

use crate::error::AppServicesError;
use crate::export_service::ExportService;
use crate::learning_service::LearningService;
use crate::sync_service::{SyncCoordinator, SyncTarget};

/// Assembles the app-facing services over one storage backend and stamps the
/// learner's login.
#[derive(Clone)]
pub struct AppServices {
    user_id: UserId,
    learning: Arc<LearningService>,
    sync: Arc<SyncCoordinator>,
    exporter: Arc<ExportService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or the initial
    /// progress record setup fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        user_id: UserId,
        questions: Arc<dyn QuestionCatalog>,
        lessons: Arc<dyn LessonCatalog>,
        target: Option<Arc<dyn SyncTarget>>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::with_storage(storage, clock, user_id, questions, lessons, target).await
    }

    /// Build services over an already-open storage backend.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the initial progress record setup fails.
    pub async fn with_storage(
        storage: Storage,
        clock: Clock,
        user_id: UserId,
        questions: Arc<dyn QuestionCatalog>,
        lessons: Arc<dyn LessonCatalog>,
        target: Option<Arc<dyn SyncTarget>>,
    ) -> Result<Self, AppServicesError> {
        let exporter = ExportService::new(
            clock,
            user_id,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.events),
        );
        let sync = Arc::new(
            SyncCoordinator::new(
                clock,
                user_id,
                Arc::clone(&storage.sync_status),
                exporter.clone(),
                target,
            )
            .await?,
        );

        ensure_progress(&storage, clock, user_id, lessons.as_ref(), &sync).await?;

        let learning = Arc::new(LearningService::new(
            clock,
            user_id,
            questions,
            lessons,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.events),
            Arc::clone(&storage.results),
            Arc::clone(&sync),
        ));

        Ok(Self {
            user_id,
            learning,
            sync,
            exporter: Arc::new(exporter),
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn learning(&self) -> Arc<LearningService> {
        Arc::clone(&self.learning)
    }

    #[must_use]
    pub fn sync(&self) -> Arc<SyncCoordinator> {
        Arc::clone(&self.sync)
    }

    #[must_use]
    pub fn exporter(&self) -> Arc<ExportService> {
        Arc::clone(&self.exporter)
    }
}

/// Creates the progress record on first launch and stamps this login.
async fn ensure_progress(
    storage: &Storage,
    clock: Clock,
    user_id: UserId,
    lessons: &dyn LessonCatalog,
    sync: &SyncCoordinator,
) -> Result<(), AppServicesError> {
    let now = clock.now();
    let mut progress = match storage.progress.get_progress(user_id).await? {
        Some(progress) => progress,
        None => ProgressRecord::new(user_id, "Learner", lessons.lesson_count()),
    };

    progress.record_login(now);
    storage.progress.upsert_progress(&progress).await?;
    sync.record_mutation().await?;
    Ok(())
}
