//! takeover-restore — restore the disaster cluster from the latest backup.
//!
//! Lists the Velero backups produced by a schedule, picks the most recent
//! one in a restorable phase, and creates a `Restore` referencing it.
//!
//! # Selection policy
//!
//! ```text
//! backups = list(namespace, velero.io/schedule-name=<schedule>)
//! sort backups by start timestamp, newest first (unstarted last)
//! pick the first with phase ∈ {New, Completed, PartiallyFailed}
//! ```
//!
//! # Components
//!
//! - **`store`** — `BackupStore` contract and the Velero/Kubernetes client
//! - **`restorer`** — selection policy and restore naming

pub mod error;
pub mod restorer;
pub mod store;

pub use error::{RestoreError, RestoreResult, StoreError};
pub use restorer::{Restore, Restorer, build_restore, most_recent_backup};
pub use store::{BackupStore, VeleroStore};
