//! takeover-failover — the control loop between health and recovery.
//!
//! Reads status transitions from the health monitor. A transition to
//! `Down` triggers one recovery attempt:
//!
//! ```text
//! Down => [grow disaster cluster]   (only when grow_on_failover is set)
//!         restore latest backup
//! Up   => log
//! ```
//!
//! Failures are logged and never retried; the next `Down` transition gets
//! a fresh attempt.

pub mod orchestrator;

pub use orchestrator::{FailoverOrchestrator, Outcome};
