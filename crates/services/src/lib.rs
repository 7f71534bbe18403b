#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod export_service;
pub mod learning_service;
pub mod sync_service;

pub use study_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, CommandError, ExportError, SyncError, ValidationError};
pub use export_service::{ExportService, UserDataExport};
pub use learning_service::{CommandOutcome, LearningService};
pub use sync_service::{
    HttpSyncTarget, SyncBatch, SyncCoordinator, SyncOutcome, SyncState, SyncTarget,
    SyncTargetConfig,
};
