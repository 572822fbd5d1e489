//! takeover-core — shared types and configuration for the takeover daemon.
//!
//! The daemon watches a production Kubernetes cluster and, when it goes
//! down, restores the latest Velero backup into a disaster-recovery
//! cluster. This crate holds the types every subsystem agrees on:
//!
//! - **`types`** — cluster status, backup/restore records, cloud node and
//!   VM template shapes (with their wire names)
//! - **`config`** — the `config.toml` model, defaults, and validation
//! - **`error`** — configuration errors, the only fatal error kind

pub mod config;
pub mod error;
pub mod types;

pub use config::TakeoverConfig;
pub use error::{ConfigError, ConfigResult};
pub use types::*;
