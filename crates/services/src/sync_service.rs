use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use storage::repository::{StorageError, SyncStatusRepository};
use study_core::Clock;
use study_core::model::{SyncStatus, UserId};

use crate::error::SyncError;
use crate::export_service::{ExportService, UserDataExport};

//
// ─── STATE MACHINE ─────────────────────────────────────────────────────────────
//

/// Runtime state of the sync coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing pending, nothing in flight.
    Idle,
    /// Committed local mutations awaiting reconciliation.
    PendingChanges(u64),
    /// A reconciliation attempt is in flight.
    Syncing,
    /// The last attempt failed; the backlog is intact and retryable.
    Error(String),
}

impl SyncState {
    fn for_pending(pending: u64) -> Self {
        if pending == 0 {
            Self::Idle
        } else {
            Self::PendingChanges(pending)
        }
    }
}

/// Result of a reconciliation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The batch was accepted by the remote target.
    Completed { pushed_changes: u64 },
    /// Cloud sync is disabled or unconfigured; no attempt was issued.
    SkippedDisabled,
}

//
// ─── SYNC TARGET ──────────────────────────────────────────────────────────────
//

/// Batch of pending local state pushed to the remote target.
#[derive(Debug, Clone, Serialize)]
pub struct SyncBatch {
    pub user_id: UserId,
    pub pending_changes: u64,
    pub snapshot: UserDataExport,
}

/// Remote endpoint accepting reconciliation batches. Opaque to this crate;
/// only success or failure comes back.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    /// Push one batch.
    ///
    /// # Errors
    ///
    /// Returns a retryable `SyncError` when the batch was not accepted.
    async fn push(&self, batch: &SyncBatch) -> Result<(), SyncError>;
}

/// Configuration for the HTTP sync target.
#[derive(Clone, Debug)]
pub struct SyncTargetConfig {
    pub base_url: Url,
    pub api_token: Option<String>,
}

impl SyncTargetConfig {
    /// Reads `STUDY_SYNC_URL` and `STUDY_SYNC_TOKEN`; `None` when no URL is
    /// set or it does not parse.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let raw = env::var("STUDY_SYNC_URL").ok()?;
        let base_url = Url::parse(raw.trim()).ok()?;
        let api_token = env::var("STUDY_SYNC_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Some(Self {
            base_url,
            api_token,
        })
    }
}

/// `SyncTarget` over HTTP.
#[derive(Clone)]
pub struct HttpSyncTarget {
    client: Client,
    config: SyncTargetConfig,
}

impl HttpSyncTarget {
    #[must_use]
    pub fn new(config: SyncTargetConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SyncTarget for HttpSyncTarget {
    async fn push(&self, batch: &SyncBatch) -> Result<(), SyncError> {
        let url = self
            .config
            .base_url
            .join("v1/progress/sync")
            .map_err(|e| SyncError::RemoteRejected(e.to_string()))?;

        let mut request = self.client.post(url).json(batch);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::NetworkUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::RemoteRejected(format!(
                "status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

//
// ─── SYNCING GUARD ─────────────────────────────────────────────────────────────
//

/// Reverts `Syncing` back to the pre-attempt state when an in-flight
/// reconciliation future is dropped (caller cancellation). Disarmed on the
/// success and failure paths, which set their own states.
struct SyncingGuard {
    state: Arc<Mutex<SyncState>>,
    revert_pending: u64,
    armed: bool,
}

impl SyncingGuard {
    fn arm(state: Arc<Mutex<SyncState>>, revert_pending: u64) -> Self {
        set_state(&state, SyncState::Syncing);
        Self {
            state,
            revert_pending,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SyncingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut guard) = self.state.lock() {
            if *guard == SyncState::Syncing {
                *guard = SyncState::for_pending(self.revert_pending);
            }
        }
    }
}

fn set_state(state: &Arc<Mutex<SyncState>>, next: SyncState) {
    if let Ok(mut guard) = state.lock() {
        *guard = next;
    }
}

//
// ─── SYNC COORDINATOR ──────────────────────────────────────────────────────────
//

/// Tracks pending local mutations and reconciles them with the remote target.
///
/// Local-first: mutation accounting always succeeds locally, sync failures
/// never block or corrupt local state, and the backlog grows unboundedly
/// until a reconciliation succeeds. No store lock is held across the network
/// await; commands stay responsive during an attempt.
#[derive(Clone)]
pub struct SyncCoordinator {
    clock: Clock,
    status_repo: Arc<dyn SyncStatusRepository>,
    exporter: ExportService,
    target: Option<Arc<dyn SyncTarget>>,
    user_id: UserId,
    state: Arc<Mutex<SyncState>>,
}

impl SyncCoordinator {
    /// Build a coordinator, resuming state from the persisted status record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the status record cannot be read or seeded.
    pub async fn new(
        clock: Clock,
        user_id: UserId,
        status_repo: Arc<dyn SyncStatusRepository>,
        exporter: ExportService,
        target: Option<Arc<dyn SyncTarget>>,
    ) -> Result<Self, StorageError> {
        let status = match status_repo.get_sync_status().await? {
            Some(status) => status,
            None => {
                let status = SyncStatus::new(target.is_some());
                status_repo.upsert_sync_status(&status).await?;
                status
            }
        };

        let state = Arc::new(Mutex::new(SyncState::for_pending(
            status.pending_change_count(),
        )));

        Ok(Self {
            clock,
            status_repo,
            exporter,
            target,
            user_id,
            state,
        })
    }

    /// Current runtime state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
            .lock()
            .map_or(SyncState::Idle, |guard| guard.clone())
    }

    /// Persisted sync status (last sync time, pending count, cloud flag).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage-medium failures.
    pub async fn status(&self) -> Result<SyncStatus, StorageError> {
        Ok(self
            .status_repo
            .get_sync_status()
            .await?
            .unwrap_or_else(|| SyncStatus::new(self.target.is_some())))
    }

    /// Counts one committed store mutation into the pending backlog.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the status record cannot be persisted.
    pub async fn record_mutation(&self) -> Result<(), StorageError> {
        let mut status = self.status().await?;
        status.record_pending_change();
        self.status_repo.upsert_sync_status(&status).await?;

        // A mutation during an in-flight attempt keeps the Syncing state;
        // the attempt's completion re-derives pending from the record.
        if self.state() != SyncState::Syncing {
            set_state(
                &self.state,
                SyncState::for_pending(status.pending_change_count()),
            );
        }
        debug!(pending = status.pending_change_count(), "queued local mutation");
        Ok(())
    }

    /// Enables or disables cloud sync without touching the backlog.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the status record cannot be persisted.
    pub async fn set_cloud_enabled(&self, enabled: bool) -> Result<(), StorageError> {
        let mut status = self.status().await?;
        status.set_cloud_enabled(enabled);
        self.status_repo.upsert_sync_status(&status).await
    }

    /// Attempt one reconciliation with the remote target.
    ///
    /// The caller supplies the timeout; expiry is treated identically to a
    /// sync failure. Dropping the returned future while it is in flight
    /// cancels the attempt and reverts the state to `PendingChanges` with
    /// the backlog unchanged.
    ///
    /// # Errors
    ///
    /// Returns a retryable `SyncError` on failure; the pending count is
    /// preserved in every failure mode.
    pub async fn reconcile(&self, timeout: Duration) -> Result<SyncOutcome, SyncError> {
        let status = self.status().await?;
        let (Some(target), true) = (self.target.as_ref(), status.cloud_enabled()) else {
            debug!("cloud sync disabled; skipping reconciliation");
            return Ok(SyncOutcome::SkippedDisabled);
        };
        let target = Arc::clone(target);

        let pending_at_start = status.pending_change_count();
        let mut guard = SyncingGuard::arm(Arc::clone(&self.state), pending_at_start);

        let snapshot = self.exporter.export().await.map_err(|e| {
            let err = match e {
                crate::error::ExportError::Storage(s) => SyncError::Storage(s),
                other => SyncError::RemoteRejected(other.to_string()),
            };
            guard.disarm();
            set_state(&self.state, SyncState::Error(err.to_string()));
            err
        })?;

        let batch = SyncBatch {
            user_id: self.user_id,
            pending_changes: pending_at_start,
            snapshot,
        };

        let pushed = tokio::time::timeout(timeout, target.push(&batch)).await;
        let result = match pushed {
            Err(_elapsed) => Err(SyncError::Timeout),
            Ok(inner) => inner,
        };

        match result {
            Ok(()) => {
                guard.disarm();
                let now = self.clock.now();
                self.finish_success(pending_at_start, now).await?;
                info!(pushed = pending_at_start, "reconciliation completed");
                Ok(SyncOutcome::Completed {
                    pushed_changes: pending_at_start,
                })
            }
            Err(err) => {
                guard.disarm();
                set_state(&self.state, SyncState::Error(err.to_string()));
                warn!(error = %err, pending = pending_at_start, "reconciliation failed");
                Err(err)
            }
        }
    }

    /// Applies a successful push: pending resets to whatever arrived after
    /// the snapshot was taken, and the sync timestamp advances.
    async fn finish_success(
        &self,
        pending_at_start: u64,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let current = self.status().await?;
        let carried = current
            .pending_change_count()
            .saturating_sub(pending_at_start);
        let status = SyncStatus::from_persisted(Some(now), carried, current.cloud_enabled());
        self.status_repo.upsert_sync_status(&status).await?;
        set_state(&self.state, SyncState::for_pending(carried));
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::repository::Storage;
    use study_core::model::ProgressRecord;
    use study_core::time::{fixed_clock, fixed_now};

    struct OkTarget {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SyncTarget for OkTarget {
        async fn push(&self, _batch: &SyncBatch) -> Result<(), SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingTarget;

    #[async_trait]
    impl SyncTarget for FailingTarget {
        async fn push(&self, _batch: &SyncBatch) -> Result<(), SyncError> {
            Err(SyncError::NetworkUnavailable("offline".into()))
        }
    }

    struct StalledTarget;

    #[async_trait]
    impl SyncTarget for StalledTarget {
        async fn push(&self, _batch: &SyncBatch) -> Result<(), SyncError> {
            // Never resolves inside any reasonable test timeout.
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    async fn coordinator_with(
        target: Option<Arc<dyn SyncTarget>>,
    ) -> (SyncCoordinator, Storage) {
        let storage = Storage::in_memory();
        let progress = ProgressRecord::new(UserId::new(1), "Learner", 4);
        storage.progress.upsert_progress(&progress).await.unwrap();

        let exporter = ExportService::new(
            fixed_clock(),
            UserId::new(1),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.events),
        );
        let coordinator = SyncCoordinator::new(
            fixed_clock(),
            UserId::new(1),
            Arc::clone(&storage.sync_status),
            exporter,
            target,
        )
        .await
        .unwrap();
        (coordinator, storage)
    }

    #[tokio::test]
    async fn mutations_move_idle_to_pending() {
        let (coordinator, _storage) =
            coordinator_with(Some(Arc::new(OkTarget { calls: AtomicUsize::new(0) }))).await;
        assert_eq!(coordinator.state(), SyncState::Idle);

        coordinator.record_mutation().await.unwrap();
        coordinator.record_mutation().await.unwrap();
        assert_eq!(coordinator.state(), SyncState::PendingChanges(2));
        assert_eq!(coordinator.status().await.unwrap().pending_change_count(), 2);
    }

    #[tokio::test]
    async fn successful_reconciliation_resets_pending() {
        let target = Arc::new(OkTarget {
            calls: AtomicUsize::new(0),
        });
        let (coordinator, _storage) = coordinator_with(Some(target.clone())).await;
        coordinator.record_mutation().await.unwrap();
        coordinator.record_mutation().await.unwrap();

        let outcome = coordinator
            .reconcile(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Completed { pushed_changes: 2 });
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), SyncState::Idle);

        let status = coordinator.status().await.unwrap();
        assert_eq!(status.pending_change_count(), 0);
        assert_eq!(status.last_sync_timestamp(), Some(fixed_now()));
    }

    #[tokio::test]
    async fn failed_reconciliation_preserves_pending() {
        let (coordinator, _storage) = coordinator_with(Some(Arc::new(FailingTarget))).await;
        coordinator.record_mutation().await.unwrap();
        coordinator.record_mutation().await.unwrap();
        coordinator.record_mutation().await.unwrap();

        let err = coordinator
            .reconcile(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NetworkUnavailable(_)));
        assert!(matches!(coordinator.state(), SyncState::Error(_)));

        let status = coordinator.status().await.unwrap();
        assert_eq!(status.pending_change_count(), 3);
        assert!(status.last_sync_timestamp().is_none());
    }

    #[tokio::test]
    async fn timeout_is_a_failure_and_preserves_pending() {
        let (coordinator, _storage) = coordinator_with(Some(Arc::new(StalledTarget))).await;
        coordinator.record_mutation().await.unwrap();

        let err = coordinator
            .reconcile(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout));
        assert_eq!(coordinator.status().await.unwrap().pending_change_count(), 1);
    }

    #[tokio::test]
    async fn cancelled_attempt_reverts_to_pending() {
        let (coordinator, _storage) = coordinator_with(Some(Arc::new(StalledTarget))).await;
        coordinator.record_mutation().await.unwrap();
        coordinator.record_mutation().await.unwrap();

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator.reconcile(Duration::from_secs(3600)).await
            })
        };

        // Let the attempt enter Syncing, then cancel it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(coordinator.state(), SyncState::Syncing);
        task.abort();
        let _ = task.await;

        assert_eq!(coordinator.state(), SyncState::PendingChanges(2));
        assert_eq!(coordinator.status().await.unwrap().pending_change_count(), 2);
    }

    #[tokio::test]
    async fn disabled_cloud_skips_attempts_but_keeps_accounting() {
        let (coordinator, _storage) =
            coordinator_with(Some(Arc::new(OkTarget { calls: AtomicUsize::new(0) }))).await;
        coordinator.set_cloud_enabled(false).await.unwrap();
        coordinator.record_mutation().await.unwrap();

        let outcome = coordinator
            .reconcile(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::SkippedDisabled);
        assert_eq!(coordinator.status().await.unwrap().pending_change_count(), 1);

        // Enabling later reconciles the full backlog.
        coordinator.set_cloud_enabled(true).await.unwrap();
        let outcome = coordinator
            .reconcile(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Completed { pushed_changes: 1 });
    }

    #[tokio::test]
    async fn unconfigured_target_never_issues_attempts() {
        let (coordinator, _storage) = coordinator_with(None).await;
        coordinator.record_mutation().await.unwrap();
        let outcome = coordinator
            .reconcile(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::SkippedDisabled);
    }
}
