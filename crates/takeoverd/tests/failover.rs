//! End-to-end failover: a failing production cluster leads to exactly one
//! restore in the disaster cluster.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::watch;

use takeover_failover::FailoverOrchestrator;
use takeover_health::{HealthMonitor, HttpProbe};
use takeover_restore::{Restorer, VeleroStore};

#[derive(Default)]
struct Clusters {
    production_up: AtomicBool,
    restores: Mutex<Vec<Value>>,
}

type Shared = Arc<Clusters>;

async fn livez(State(clusters): State<Shared>) -> StatusCode {
    if clusters.production_up.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn backups() -> Json<Value> {
    Json(json!({
        "items": [
            {
                "metadata": {"name": "older", "namespace": "velero"},
                "status": {"phase": "Completed", "startTimestamp": "2024-05-01T09:00:00Z"}
            },
            {
                "metadata": {"name": "newest", "namespace": "velero"},
                "status": {"phase": "PartiallyFailed", "startTimestamp": "2024-05-01T10:00:00Z"}
            },
            {
                "metadata": {"name": "broken", "namespace": "velero"},
                "status": {"phase": "Failed", "startTimestamp": "2024-05-01T11:00:00Z"}
            }
        ]
    }))
}

async fn create_restore(
    State(clusters): State<Shared>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    clusters.restores.lock().unwrap().push(body.clone());
    (StatusCode::CREATED, Json(body))
}

async fn spawn_clusters(clusters: Shared) -> SocketAddr {
    let router = Router::new()
        .route("/livez", get(livez))
        .route("/apis/velero.io/v1/namespaces/velero/backups", get(backups))
        .route(
            "/apis/velero.io/v1/namespaces/velero/restores",
            axum::routing::post(create_restore),
        )
        .with_state(clusters);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn wait_for_restores(clusters: &Clusters, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while clusters.restores.lock().unwrap().len() < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("restore was not created");
}

#[tokio::test]
async fn down_transition_restores_once() {
    let clusters = Shared::default();
    let addr = spawn_clusters(clusters.clone()).await;

    let probe = HttpProbe::new(&addr.to_string(), "/livez", Duration::from_secs(1));
    let monitor = HealthMonitor::new(probe, Duration::from_millis(20));
    let store = VeleroStore::new(&format!("http://{addr}"), None, false).unwrap();
    let orchestrator =
        FailoverOrchestrator::new(Restorer::new(store, "velero", "takeover-schedule"));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let events = monitor.watch(shutdown_rx.clone());
    let handle = tokio::spawn(async move { orchestrator.run(events, shutdown_rx).await });

    // Production starts down: the baseline probe triggers one restore.
    wait_for_restores(&clusters, 1).await;

    // Many more down probes; still only one restore.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(clusters.restores.lock().unwrap().len(), 1);

    // Up, then down again: a fresh attempt.
    clusters.production_up.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    clusters.production_up.store(false, Ordering::SeqCst);
    wait_for_restores(&clusters, 2).await;

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("orchestrator did not stop")
        .unwrap();

    let restores = clusters.restores.lock().unwrap();
    for restore in restores.iter() {
        assert_eq!(restore["spec"]["backupName"], "newest");
        let name = restore["metadata"]["name"].as_str().unwrap();
        assert!(name.starts_with("takeover-"));
        assert_eq!(name.len(), "takeover-".len() + 14);
    }
}
