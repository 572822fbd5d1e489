//! Server mode — health monitor feeding the failover orchestrator.
//!
//! In this mode, the daemon:
//! 1. Probes the production cluster's liveness endpoint on a fixed period
//! 2. Hands every status change to the failover orchestrator
//! 3. On `Down`, optionally grows the disaster cluster, then restores
//! 4. Stops on SIGINT or SIGTERM

use clap::Args;
use tokio::sync::watch;
use tracing::{info, warn};

use takeover_core::TakeoverConfig;
use takeover_core::config::ProductionConfig;
use takeover_failover::FailoverOrchestrator;
use takeover_health::{ApiServerProbe, HealthMonitor, HttpProbe, LivenessProbe};
use takeover_restore::{Restorer, VeleroStore};

use crate::scale;

/// Flags that override the `[server]` and `[disaster]` sections.
#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    /// Interval between liveness probes, e.g. "15s".
    #[arg(long)]
    pub check_cluster_period: Option<String>,

    /// Velero schedule whose backups are restored.
    #[arg(long)]
    pub schedule_name: Option<String>,

    /// Namespace holding the Velero backups and restores.
    #[arg(long)]
    pub namespace: Option<String>,
}

impl ServerArgs {
    pub fn apply(&self, config: &mut TakeoverConfig) {
        if let Some(period) = &self.check_cluster_period {
            config.server.check_cluster_period = period.clone();
        }
        if let Some(schedule) = &self.schedule_name {
            config.server.schedule_name = schedule.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.disaster.namespace = namespace.clone();
        }
    }
}

/// Run until interrupted.
pub async fn run(config: TakeoverConfig) -> anyhow::Result<()> {
    let period = config.check_cluster_period();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        production = %config.production.base_url(),
        liveness_path = %config.production.liveness_path,
        period_ms = period.as_millis() as u64,
        disaster = %config.disaster.api_server,
        namespace = %config.disaster.namespace,
        schedule = %config.server.schedule_name,
        "takeover server starting"
    );

    // ── Recovery path ──────────────────────────────────────────

    let store = VeleroStore::from_config(&config.disaster)?;
    let restorer = Restorer::new(
        store,
        &config.disaster.namespace,
        &config.server.schedule_name,
    );
    let mut orchestrator = FailoverOrchestrator::new(restorer);

    if config.server.grow_on_failover {
        match &config.ecloud {
            Some(ecloud) => {
                let scaler = scale::scaler(ecloud)?;
                info!(
                    cluster = %scaler.cluster_id(),
                    increase_num = scaler.increase_num(),
                    "disaster cluster grows on failover"
                );
                orchestrator = orchestrator.with_scaler(scaler);
            }
            None => warn!("grow_on_failover is set but no [ecloud] section is configured"),
        }
    }

    // ── Health monitor ─────────────────────────────────────────

    let probe = liveness_probe(&config.production, config.probe_timeout())?;
    let monitor = HealthMonitor::new(probe, period);

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let events = monitor.watch(shutdown_rx.clone());

    let mut handle = tokio::spawn(async move {
        orchestrator.run(events, shutdown_rx).await;
    });

    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            (&mut handle).await?;
        }
        joined = &mut handle => {
            joined?;
            warn!("failover orchestrator exited before shutdown");
        }
    }

    info!("takeover server stopped");
    Ok(())
}

/// Plain HTTP/1 for an unauthenticated `http` endpoint such as
/// `kubectl proxy`; reqwest with TLS and the bearer token otherwise.
fn liveness_probe(
    production: &ProductionConfig,
    timeout: std::time::Duration,
) -> anyhow::Result<Box<dyn LivenessProbe>> {
    if production.is_plain_http() {
        return Ok(Box::new(HttpProbe::new(
            &production.address,
            &production.liveness_path,
            timeout,
        )));
    }
    let probe = ApiServerProbe::new(
        &production.base_url(),
        &production.liveness_path,
        production.token.clone(),
        production.accept_invalid_certs,
        timeout,
    )?;
    Ok(Box::new(probe))
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
