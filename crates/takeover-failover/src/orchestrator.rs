//! FailoverOrchestrator — one recovery attempt per `Down` transition.

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use takeover_core::{RestoreRequest, Status};
use takeover_ecloud::{Grow, GrowError};
use takeover_restore::{Restore, RestoreError};

/// What handling one status event led to.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `Up`; nothing to recover.
    Healthy,
    Restored(RestoreRequest),
    /// The restore was not created. Already logged.
    RestoreFailed,
}

pub struct FailoverOrchestrator {
    restorer: Box<dyn Restore>,
    scaler: Option<Box<dyn Grow>>,
}

impl FailoverOrchestrator {
    pub fn new(restorer: impl Restore + 'static) -> Self {
        Self {
            restorer: Box::new(restorer),
            scaler: None,
        }
    }

    /// Grow the disaster cluster before each restore.
    pub fn with_scaler(mut self, scaler: impl Grow + 'static) -> Self {
        self.scaler = Some(Box::new(scaler));
        self
    }

    /// Consume status events until `shutdown` fires or the stream closes.
    pub async fn run(&self, mut events: mpsc::Receiver<Status>, mut shutdown: watch::Receiver<bool>) {
        info!(grow_on_failover = self.scaler.is_some(), "failover orchestrator started");

        loop {
            let status = tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => break,
                event = events.recv() => match event {
                    Some(status) => status,
                    None => {
                        debug!("health event stream closed");
                        break;
                    }
                },
            };

            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => {
                    warn!(%status, "shutdown while handling status event");
                    break;
                }
                _ = self.handle(status) => {}
            }
        }

        info!("failover orchestrator stopped");
    }

    /// Handle a single status transition.
    pub async fn handle(&self, status: Status) -> Outcome {
        match status {
            Status::Up => {
                info!("production cluster is up");
                Outcome::Healthy
            }
            Status::Down => {
                warn!("production cluster is down, taking over");
                if let Some(scaler) = &self.scaler {
                    self.grow(scaler.as_ref()).await;
                }
                self.restore().await
            }
        }
    }

    async fn grow(&self, scaler: &dyn Grow) {
        match scaler.grow().await {
            Ok(report) => info!(
                before = report.before,
                target = report.target,
                added = report.added,
                "disaster cluster grown"
            ),
            Err(GrowError::Partial {
                added,
                remaining,
                source,
            }) => error!(added, remaining, error = %source, "disaster cluster partially grown"),
            Err(e) => error!(error = %e, "failed to grow disaster cluster"),
        }
    }

    async fn restore(&self) -> Outcome {
        match self.restorer.restore().await {
            Ok(restore) => {
                info!(
                    name = %restore.name,
                    namespace = %restore.namespace,
                    backup = %restore.backup_name,
                    "takeover restore created"
                );
                Outcome::Restored(restore)
            }
            Err(RestoreError::NoBackupAvailable {
                namespace,
                schedule,
            }) => {
                error!(%namespace, %schedule, "no backup available, nothing restored");
                Outcome::RestoreFailed
            }
            Err(e) => {
                error!(error = %e, "restore failed");
                Outcome::RestoreFailed
            }
        }
    }
}
