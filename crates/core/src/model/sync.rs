use chrono::{DateTime, Utc};

/// Singleton record tracking reconciliation with the remote sync target.
///
/// `pending_change_count` counts committed local mutations that have not yet
/// been pushed; it grows without bound while the device is offline and only
/// a successful reconciliation resets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    last_sync_timestamp: Option<DateTime<Utc>>,
    pending_change_count: u64,
    cloud_enabled: bool,
}

impl SyncStatus {
    /// Initial status: never synced, nothing pending.
    #[must_use]
    pub fn new(cloud_enabled: bool) -> Self {
        Self {
            last_sync_timestamp: None,
            pending_change_count: 0,
            cloud_enabled,
        }
    }

    /// Rehydrate a status record from persisted storage.
    #[must_use]
    pub fn from_persisted(
        last_sync_timestamp: Option<DateTime<Utc>>,
        pending_change_count: u64,
        cloud_enabled: bool,
    ) -> Self {
        Self {
            last_sync_timestamp,
            pending_change_count,
            cloud_enabled,
        }
    }

    #[must_use]
    pub fn last_sync_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_sync_timestamp
    }

    #[must_use]
    pub fn pending_change_count(&self) -> u64 {
        self.pending_change_count
    }

    #[must_use]
    pub fn cloud_enabled(&self) -> bool {
        self.cloud_enabled
    }

    /// Counts one committed local mutation.
    pub fn record_pending_change(&mut self) {
        self.pending_change_count = self.pending_change_count.saturating_add(1);
    }

    /// Marks a successful reconciliation at `now`.
    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.pending_change_count = 0;
        self.last_sync_timestamp = Some(now);
    }

    /// Toggles whether reconciliation attempts are issued.
    ///
    /// Mutation accounting continues either way, so enabling sync later
    /// reconciles the full backlog.
    pub fn set_cloud_enabled(&mut self, enabled: bool) {
        self.cloud_enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn pending_changes_accumulate_and_reset_on_sync() {
        let mut status = SyncStatus::new(true);
        status.record_pending_change();
        status.record_pending_change();
        assert_eq!(status.pending_change_count(), 2);

        status.mark_synced(fixed_now());
        assert_eq!(status.pending_change_count(), 0);
        assert_eq!(status.last_sync_timestamp(), Some(fixed_now()));
    }

    #[test]
    fn disabling_cloud_keeps_accounting() {
        let mut status = SyncStatus::new(false);
        status.record_pending_change();
        assert!(!status.cloud_enabled());
        assert_eq!(status.pending_change_count(), 1);

        status.set_cloud_enabled(true);
        assert_eq!(status.pending_change_count(), 1);
    }
}
