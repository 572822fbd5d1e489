//! Backup store — where backups are listed and restores are created.
//!
//! `VeleroStore` talks to the disaster cluster's Kubernetes API server and
//! reads/writes `velero.io/v1` `Backup` and `Restore` objects.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use takeover_core::config::DisasterConfig;
use takeover_core::{BackupPhase, BackupRecord, RestoreRequest, SCHEDULE_NAME_LABEL};

use crate::error::StoreError;

const VELERO_API_VERSION: &str = "velero.io/v1";

/// Backup listing and restore creation.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Backups in `namespace` labelled with `schedule`.
    async fn list_backups(
        &self,
        namespace: &str,
        schedule: &str,
    ) -> Result<Vec<BackupRecord>, StoreError>;

    /// Create a restore. Returns the object as stored.
    async fn create_restore(&self, restore: &RestoreRequest) -> Result<RestoreRequest, StoreError>;
}

/// Velero objects on a Kubernetes API server.
#[derive(Debug, Clone)]
pub struct VeleroStore {
    http: reqwest::Client,
    api_server: String,
    token: Option<String>,
}

impl VeleroStore {
    pub fn new(
        api_server: &str,
        token: Option<String>,
        accept_invalid_certs: bool,
    ) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self {
            http,
            api_server: api_server.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &DisasterConfig) -> Result<Self, StoreError> {
        Self::new(
            &config.api_server,
            config.token.clone(),
            config.accept_invalid_certs,
        )
    }

    fn collection_url(&self, namespace: &str, resource: &str) -> String {
        format!(
            "{}/apis/{VELERO_API_VERSION}/namespaces/{namespace}/{resource}",
            self.api_server
        )
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl BackupStore for VeleroStore {
    async fn list_backups(
        &self,
        namespace: &str,
        schedule: &str,
    ) -> Result<Vec<BackupRecord>, StoreError> {
        let url = self.collection_url(namespace, "backups");
        let selector = format!("{SCHEDULE_NAME_LABEL}={schedule}");
        debug!(%url, %selector, "listing backups");

        let resp = self
            .authorize(self.http.get(&url))
            .query(&[("labelSelector", selector.as_str())])
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let list: BackupList = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(list.items.into_iter().map(VeleroBackup::into_record).collect())
    }

    async fn create_restore(&self, restore: &RestoreRequest) -> Result<RestoreRequest, StoreError> {
        let url = self.collection_url(&restore.namespace, "restores");
        debug!(%url, name = %restore.name, "creating restore");

        let resp = self
            .authorize(self.http.post(&url))
            .json(&restore_manifest(restore))
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let created: VeleroRestore = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(created.into_request())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status { status, body })
}

/// The `velero.io/v1` `Restore` object for a request.
pub fn restore_manifest(restore: &RestoreRequest) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": VELERO_API_VERSION,
        "kind": "Restore",
        "metadata": {
            "name": restore.name,
            "namespace": restore.namespace,
            "labels": restore.labels,
        },
        "spec": {
            "backupName": restore.backup_name,
        },
    })
}

// ── Wire shapes ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BackupList {
    #[serde(default)]
    items: Vec<VeleroBackup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ObjectMeta {
    name: String,
    namespace: String,
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct VeleroBackup {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    status: Option<BackupStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BackupStatus {
    phase: BackupPhase,
    start_timestamp: Option<DateTime<Utc>>,
}

impl VeleroBackup {
    fn into_record(self) -> BackupRecord {
        let status = self.status.unwrap_or_default();
        let schedule = self
            .metadata
            .labels
            .and_then(|mut labels| labels.remove(SCHEDULE_NAME_LABEL))
            .unwrap_or_default();
        BackupRecord {
            name: self.metadata.name,
            namespace: self.metadata.namespace,
            schedule,
            phase: status.phase,
            start_timestamp: status.start_timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VeleroRestore {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: RestoreSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RestoreSpec {
    backup_name: String,
}

impl VeleroRestore {
    fn into_request(self) -> RestoreRequest {
        RestoreRequest {
            name: self.metadata.name,
            namespace: self.metadata.namespace,
            labels: self.metadata.labels.unwrap_or_default(),
            backup_name: self.spec.backup_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_list_decodes_velero_objects() {
        let json = r#"{
            "apiVersion": "velero.io/v1",
            "kind": "BackupList",
            "items": [
                {
                    "metadata": {
                        "name": "takeover-schedule-20240501100000",
                        "namespace": "velero",
                        "labels": {"velero.io/schedule-name": "takeover-schedule"}
                    },
                    "status": {
                        "phase": "Completed",
                        "startTimestamp": "2024-05-01T10:00:00Z"
                    }
                },
                {
                    "metadata": {"name": "pending", "namespace": "velero"},
                    "status": {}
                },
                {
                    "metadata": {"name": "fresh", "namespace": "velero"}
                }
            ]
        }"#;

        let list: BackupList = serde_json::from_str(json).unwrap();
        let records: Vec<BackupRecord> =
            list.items.into_iter().map(VeleroBackup::into_record).collect();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].schedule, "takeover-schedule");
        assert_eq!(records[0].phase, BackupPhase::Completed);
        assert!(records[0].start_timestamp.is_some());

        assert_eq!(records[1].phase, BackupPhase::Unknown);
        assert_eq!(records[1].start_timestamp, None);
        assert_eq!(records[2].phase, BackupPhase::Unknown);
    }

    #[test]
    fn manifest_references_backup() {
        let restore = RestoreRequest {
            name: "takeover-20240501102030".to_string(),
            namespace: "velero".to_string(),
            labels: BTreeMap::from([(
                "takeover-timestamp".to_string(),
                "20240501102030".to_string(),
            )]),
            backup_name: "nightly-1".to_string(),
        };

        let manifest = restore_manifest(&restore);
        assert_eq!(manifest["apiVersion"], "velero.io/v1");
        assert_eq!(manifest["kind"], "Restore");
        assert_eq!(manifest["metadata"]["name"], "takeover-20240501102030");
        assert_eq!(manifest["metadata"]["labels"]["takeover-timestamp"], "20240501102030");
        assert_eq!(manifest["spec"]["backupName"], "nightly-1");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let store = VeleroStore::new("https://10.1.0.10:6443/", None, false).unwrap();
        assert_eq!(
            store.collection_url("velero", "backups"),
            "https://10.1.0.10:6443/apis/velero.io/v1/namespaces/velero/backups"
        );
    }
}
