use sqlx::Row;
use study_core::model::SyncStatus;

use super::{
    SqliteStore,
    mapping::{io, ser},
};
use crate::repository::{StorageError, SyncStatusRepository};

#[async_trait::async_trait]
impl SyncStatusRepository for SqliteStore {
    async fn get_sync_status(&self) -> Result<Option<SyncStatus>, StorageError> {
        let Some(row) = sqlx::query(
            r"
                SELECT last_sync_timestamp, pending_change_count, cloud_enabled
                FROM sync_status
                WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(io)?
        else {
            return Ok(None);
        };

        let pending: i64 = row.try_get("pending_change_count").map_err(ser)?;
        let pending = u64::try_from(pending)
            .map_err(|_| StorageError::Serialization("negative pending count".into()))?;

        Ok(Some(SyncStatus::from_persisted(
            row.try_get("last_sync_timestamp").map_err(ser)?,
            pending,
            row.try_get("cloud_enabled").map_err(ser)?,
        )))
    }

    async fn upsert_sync_status(&self, status: &SyncStatus) -> Result<(), StorageError> {
        let pending = i64::try_from(status.pending_change_count())
            .map_err(|_| StorageError::Serialization("pending count overflow".into()))?;

        sqlx::query(
            r"
                INSERT INTO sync_status (id, last_sync_timestamp, pending_change_count, cloud_enabled)
                VALUES (1, ?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    last_sync_timestamp = excluded.last_sync_timestamp,
                    pending_change_count = excluded.pending_change_count,
                    cloud_enabled = excluded.cloud_enabled
            ",
        )
        .bind(status.last_sync_timestamp())
        .bind(pending)
        .bind(status.cloud_enabled())
        .execute(&self.pool)
        .await
        .map_err(io)?;

        Ok(())
    }
}
