//! Shared types used across takeover crates.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Label Velero puts on every backup produced by a schedule.
pub const SCHEDULE_NAME_LABEL: &str = "velero.io/schedule-name";

/// Label carrying the timestamp token of a restore we created.
pub const RESTORE_TIMESTAMP_LABEL: &str = "takeover-timestamp";

/// Prefix of generated restore names.
pub const RESTORE_NAME_PREFIX: &str = "takeover";

/// Liveness of the production cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// The liveness endpoint answered 200.
    Up,
    /// The probe errored, timed out, or got a non-200 answer.
    Down,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Up => write!(f, "Up"),
            Status::Down => write!(f, "Down"),
        }
    }
}

// ── Backups and restores ───────────────────────────────────────

/// Lifecycle stage of a Velero backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackupPhase {
    New,
    FailedValidation,
    InProgress,
    WaitingForPluginOperations,
    WaitingForPluginOperationsPartiallyFailed,
    Finalizing,
    FinalizingPartiallyFailed,
    Completed,
    PartiallyFailed,
    Failed,
    Deleting,
    /// Missing or unrecognised phase.
    #[default]
    #[serde(other)]
    Unknown,
}

impl BackupPhase {
    /// Phases a restore may be started from.
    pub const RESTORABLE: [BackupPhase; 3] = [
        BackupPhase::New,
        BackupPhase::Completed,
        BackupPhase::PartiallyFailed,
    ];

    pub fn is_restorable(self) -> bool {
        Self::RESTORABLE.contains(&self)
    }
}

/// A backup previously captured from the production cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub name: String,
    pub namespace: String,
    /// Value of the `velero.io/schedule-name` label.
    pub schedule: String,
    pub phase: BackupPhase,
    /// Absent for backups that have not started yet.
    pub start_timestamp: Option<DateTime<Utc>>,
}

/// A restore to be created in the disaster cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    /// Name of the backup to restore from.
    pub backup_name: String,
}

// ── Cloud nodes ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    #[serde(rename = "ipVersion")]
    pub ip_version: String,
    #[serde(rename = "ipAddress")]
    pub ip_address: String,
}

/// A compute node of a cloud-managed Kubernetes cluster.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    #[serde(rename = "nodeID")]
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    pub cpu: u32,
    pub memory: u64,
    #[serde(rename = "Addresses", deserialize_with = "null_as_default")]
    pub addresses: Vec<Address>,
    pub taints: bool,
    pub schedulable: bool,
    pub role: String,
    pub status: String,
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(rename = "createdTime")]
    pub created_time: String,
}

/// Snapshot of a cluster's nodes. Never cached; fetched per call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeList {
    pub total: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub nodes: Vec<Node>,
}

// ── VM template ────────────────────────────────────────────────
//
// Field names serialize to the cloud API's wire names. Snake-case aliases
// let config.toml use the same struct.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeType {
    #[serde(rename = "highPerformance", alias = "high_performance")]
    HighPerformance,
    #[serde(rename = "performanceOptimization", alias = "performance_optimization")]
    PerformanceOptimization,
    #[serde(rename = "ebs_ceph_cache")]
    EbsCephCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServerVmType {
    #[default]
    #[serde(rename = "common")]
    Common,
    #[serde(rename = "memImprove", alias = "mem_improve")]
    MemImprove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Size in GiB.
    pub size: u32,
    #[serde(rename = "volumeType", alias = "volume_type")]
    pub volume_type: VolumeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volumes {
    #[serde(rename = "systemDisk", alias = "system_disk")]
    pub system_disk: Volume,
    #[serde(rename = "dataDisk", alias = "data_disk")]
    pub data_disk: Volume,
}

/// Shape of a node to add. Password and keypair are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Infrastructure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    #[serde(
        rename = "serverType",
        alias = "server_type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub server_type: Option<String>,
    #[serde(rename = "serverVmType", alias = "server_vm_type", default)]
    pub server_vm_type: ServerVmType,
    #[serde(
        rename = "imageId",
        alias = "image_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_id: Option<String>,
    pub cpu: u32,
    pub disk: u32,
    pub ram: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypair: Option<String>,
    pub volumes: Volumes,
    #[serde(rename = "SpecsName", alias = "specs_name")]
    pub specs_name: String,
    #[serde(
        rename = "maxbandwidth",
        alias = "max_bandwidth",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_bandwidth: Option<String>,
}

/// Where to add nodes, and what they look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VMTemplate {
    pub cluster_id: String,
    pub infrastructure: Infrastructure,
}

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
