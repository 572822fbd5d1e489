//! Health monitor — background task that probes the production cluster.
//!
//! The `HealthMonitor` probes once immediately, then once per period,
//! and emits a `Status` only when it differs from the last one emitted.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use takeover_core::Status;

use crate::probe::LivenessProbe;

/// Converts raw probe samples into an edge-triggered event stream.
pub struct HealthMonitor<P> {
    probe: P,
    period: Duration,
    /// Last status handed to the consumer. `None` until the baseline probe.
    last: Option<Status>,
}

impl<P: LivenessProbe + 'static> HealthMonitor<P> {
    pub fn new(probe: P, period: Duration) -> Self {
        Self {
            probe,
            // `tokio::time::interval` rejects a zero period.
            period: period.max(Duration::from_millis(1)),
            last: None,
        }
    }

    /// Last emitted status.
    pub fn last_status(&self) -> Option<Status> {
        self.last
    }

    /// Record a raw sample. Returns the status to emit, if it changed.
    pub fn observe(&mut self, status: Status) -> Option<Status> {
        match self.last {
            Some(prev) if prev == status => {
                debug!(%status, "cluster current status");
                None
            }
            Some(prev) => {
                info!(from = %prev, to = %status, "cluster status changed");
                self.last = Some(status);
                Some(status)
            }
            None => {
                info!(%status, "cluster initial status");
                self.last = Some(status);
                Some(status)
            }
        }
    }

    /// Spawn the probe loop and return its event stream.
    ///
    /// The stream closes once `shutdown` fires.
    pub fn watch(self, shutdown: watch::Receiver<bool>) -> mpsc::Receiver<Status> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(self.run(tx, shutdown));
        rx
    }

    /// The probe loop. Returns when `shutdown` fires or the receiver is dropped.
    ///
    /// A channel slot is reserved before every probe, so an event the
    /// consumer has not taken yet holds back the next probe.
    pub async fn run(mut self, events: mpsc::Sender<Status>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(period_ms = self.period.as_millis() as u64, "health monitor starting");

        loop {
            // The first tick completes immediately: that is the baseline probe.
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break,
                _ = ticker.tick() => {}
            }

            // No probe until the consumer has taken the previous event.
            let permit = tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break,
                permit = events.reserve() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        debug!("health event receiver dropped");
                        break;
                    }
                },
            };

            let status = tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break,
                status = self.probe.probe() => status,
            };

            if let Some(change) = self.observe(status) {
                permit.send(change);
            }
        }

        debug!("health monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;

    /// Replays a fixed sequence of samples, then repeats the last one.
    struct ScriptedProbe {
        samples: Mutex<VecDeque<Status>>,
        tail: Status,
    }

    impl ScriptedProbe {
        fn new(samples: &[Status]) -> Self {
            Self {
                samples: Mutex::new(samples.iter().copied().collect()),
                tail: *samples.last().unwrap(),
            }
        }
    }

    #[async_trait]
    impl LivenessProbe for ScriptedProbe {
        async fn probe(&self) -> Status {
            self.samples.lock().unwrap().pop_front().unwrap_or(self.tail)
        }
    }

    use Status::{Down, Up};

    fn pseudo_random_samples(n: usize) -> Vec<Status> {
        let mut seed: u32 = 0x2545_f491;
        (0..n)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                if (seed >> 16) & 1 == 0 { Up } else { Down }
            })
            .collect()
    }

    #[test]
    fn observe_emits_baseline() {
        let mut monitor = HealthMonitor::new(ScriptedProbe::new(&[Down]), Duration::from_secs(1));
        assert_eq!(monitor.last_status(), None);
        assert_eq!(monitor.observe(Down), Some(Down));
        assert_eq!(monitor.last_status(), Some(Down));
    }

    #[test]
    fn observe_suppresses_repeats() {
        let mut monitor = HealthMonitor::new(ScriptedProbe::new(&[Up]), Duration::from_secs(1));
        assert_eq!(monitor.observe(Up), Some(Up));
        assert_eq!(monitor.observe(Up), None);
        assert_eq!(monitor.observe(Down), Some(Down));
        assert_eq!(monitor.observe(Down), None);
        assert_eq!(monitor.observe(Down), None);
        assert_eq!(monitor.observe(Up), Some(Up));
    }

    #[test]
    fn emitted_stream_never_repeats() {
        let samples = pseudo_random_samples(500);
        let mut monitor = HealthMonitor::new(ScriptedProbe::new(&[Up]), Duration::from_secs(1));

        let emitted: Vec<Status> = samples.iter().filter_map(|s| monitor.observe(*s)).collect();

        assert_eq!(emitted[0], samples[0]);
        for pair in emitted.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        // Every change in the raw samples produces exactly one event.
        let changes = samples.windows(2).filter(|w| w[0] != w[1]).count();
        assert_eq!(emitted.len(), changes + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn watch_emits_only_transitions() {
        let probe = ScriptedProbe::new(&[Up, Up, Down, Down, Down, Up, Up, Down]);
        let monitor = HealthMonitor::new(probe, Duration::from_secs(15));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut events = monitor.watch(shutdown_rx);

        assert_eq!(events.recv().await, Some(Up));
        assert_eq!(events.recv().await, Some(Down));
        assert_eq!(events.recv().await, Some(Up));
        assert_eq!(events.recv().await, Some(Down));

        // The probe keeps reporting Down; nothing more is emitted.
        let quiet = tokio::time::timeout(Duration::from_secs(120), events.recv()).await;
        assert!(quiet.is_err());

        shutdown_tx.send(true).unwrap();
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn baseline_is_first_probe() {
        let probe = ScriptedProbe::new(&[Down, Down, Up]);
        let monitor = HealthMonitor::new(probe, Duration::from_secs(15));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut events = monitor.watch(shutdown_rx);

        let start = tokio::time::Instant::now();
        assert_eq!(events.recv().await, Some(Down));
        // The baseline does not wait for a period.
        assert!(start.elapsed() < Duration::from_secs(15));
        assert_eq!(events.recv().await, Some(Up));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_unblocks_pending_send() {
        let probe = ScriptedProbe::new(&[Up, Down, Up]);
        let monitor = HealthMonitor::new(probe, Duration::from_secs(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, _rx) = mpsc::channel(1);

        // Nobody reads `_rx`: the first event fills the slot, the second blocks.
        let handle = tokio::spawn(monitor.run(tx, shutdown_rx));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!handle.is_finished());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }

    /// Counts calls; alternates Up and Down so every sample is a change.
    struct CountingCheck {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LivenessProbe for CountingCheck {
        async fn probe(&self) -> Status {
            let n = self.count.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 { Up } else { Down }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn untaken_event_holds_back_next_check() {
        let count = Arc::new(AtomicUsize::new(0));
        let check = CountingCheck {
            count: count.clone(),
        };
        let monitor = HealthMonitor::new(check, Duration::from_secs(1));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut events = monitor.watch(shutdown_rx);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Taking the baseline lets exactly one more check run.
        assert_eq!(events.recv().await, Some(Up));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert_eq!(events.recv().await, Some(Down));
        assert_eq!(events.recv().await, Some(Up));
        assert!(count.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_receiver_stops_monitor() {
        let probe = ScriptedProbe::new(&[Up, Down]);
        let monitor = HealthMonitor::new(probe, Duration::from_secs(1));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let handle = tokio::spawn(monitor.run(tx, shutdown_rx));
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
