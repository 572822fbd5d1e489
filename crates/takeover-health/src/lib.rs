//! takeover-health — liveness monitoring of the production cluster.
//!
//! Turns periodic HTTP probes into a stream of status *changes*. The
//! monitor runs as a background task and hands each change to a single
//! consumer over a one-slot channel.
//!
//! # Architecture
//!
//! ```text
//! HealthMonitor
//!   ├── immediate baseline probe, then one probe per period
//!   ├── LivenessProbe::probe() → Status (errors collapse into Down)
//!   ├── edge detection against the last emitted status
//!   └── mpsc::Sender<Status> (capacity 1) → FailoverOrchestrator
//! ```
//!
//! # Backpressure
//!
//! Sending blocks the probe loop until the consumer takes the event, so
//! no transition is ever dropped. A pending send still yields to the
//! shutdown signal.

pub mod monitor;
pub mod probe;

pub use monitor::HealthMonitor;
pub use probe::{ApiServerProbe, HttpProbe, LivenessProbe, http_probe};
