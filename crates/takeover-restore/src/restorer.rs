//! Restorer — picks the backup to recover from and requests the restore.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use tracing::{error, info, warn};

use takeover_core::{BackupRecord, RESTORE_NAME_PREFIX, RESTORE_TIMESTAMP_LABEL, RestoreRequest};

use crate::error::{RestoreError, RestoreResult};
use crate::store::BackupStore;

/// A restore trigger, as seen by the failover loop.
#[async_trait]
pub trait Restore: Send + Sync {
    /// Create a restore from the best available backup.
    async fn restore(&self) -> RestoreResult<RestoreRequest>;
}

/// Restores the disaster cluster from the backups of one schedule.
pub struct Restorer<S> {
    store: S,
    namespace: String,
    schedule_name: String,
}

impl<S: BackupStore> Restorer<S> {
    pub fn new(store: S, namespace: &str, schedule_name: &str) -> Self {
        Self {
            store,
            namespace: namespace.to_string(),
            schedule_name: schedule_name.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn schedule_name(&self) -> &str {
        &self.schedule_name
    }

    /// Restore, naming the restore after `now`.
    pub async fn restore_at<Tz>(&self, now: DateTime<Tz>) -> RestoreResult<RestoreRequest>
    where
        Tz: TimeZone + Send + Sync,
        Tz::Offset: std::fmt::Display + Send + Sync,
    {
        let backups = self
            .store
            .list_backups(&self.namespace, &self.schedule_name)
            .await
            .map_err(|e| {
                error!(
                    namespace = %self.namespace,
                    schedule = %self.schedule_name,
                    error = %e,
                    "failed to list schedule backups"
                );
                RestoreError::Backend(e)
            })?;

        if backups.is_empty() {
            warn!(
                namespace = %self.namespace,
                schedule = %self.schedule_name,
                "schedule has no backup"
            );
            return Err(self.no_backup());
        }

        let total = backups.len();
        let Some(backup) = most_recent_backup(backups) else {
            warn!(
                namespace = %self.namespace,
                schedule = %self.schedule_name,
                backups = total,
                "schedule has no backup in a restorable phase"
            );
            return Err(self.no_backup());
        };

        info!(
            backup = %backup.name,
            phase = ?backup.phase,
            started = ?backup.start_timestamp,
            candidates = total,
            "selected backup"
        );

        let request = build_restore(&self.namespace, &backup.name, &now);
        let created = self.store.create_restore(&request).await.map_err(|e| {
            error!(
                namespace = %self.namespace,
                name = %request.name,
                error = %e,
                "failed to create restore"
            );
            RestoreError::Backend(e)
        })?;

        info!(
            name = %created.name,
            namespace = %created.namespace,
            backup = %created.backup_name,
            "restore created"
        );
        Ok(created)
    }

    fn no_backup(&self) -> RestoreError {
        RestoreError::NoBackupAvailable {
            namespace: self.namespace.clone(),
            schedule: self.schedule_name.clone(),
        }
    }
}

#[async_trait]
impl<S: BackupStore> Restore for Restorer<S> {
    async fn restore(&self) -> RestoreResult<RestoreRequest> {
        self.restore_at(Local::now()).await
    }
}

/// The newest backup in a restorable phase.
///
/// Sorting is stable and newest-first; a backup without a start timestamp
/// sorts after every backup that has one.
pub fn most_recent_backup(mut backups: Vec<BackupRecord>) -> Option<BackupRecord> {
    // `None < Some(_)`, so reversing the comparison puts unstarted backups last.
    backups.sort_by(|a, b| b.start_timestamp.cmp(&a.start_timestamp));
    backups.into_iter().find(|b| b.phase.is_restorable())
}

/// 14-digit `YYYYMMDDHHMMSS` token in the clock's own time zone.
pub fn restore_timestamp<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Restore request for `backup_name`, named and labelled after `now`.
pub fn build_restore<Tz>(namespace: &str, backup_name: &str, now: &DateTime<Tz>) -> RestoreRequest
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let token = restore_timestamp(now);
    RestoreRequest {
        name: format!("{RESTORE_NAME_PREFIX}-{token}"),
        namespace: namespace.to_string(),
        labels: BTreeMap::from([(RESTORE_TIMESTAMP_LABEL.to_string(), token)]),
        backup_name: backup_name.to_string(),
    }
}
