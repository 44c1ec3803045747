//! Fixed-interval driver for the reconciliation pass.
//!
//! The loop is an owned handle: `start` spawns it on the current Tokio
//! runtime and `stop` signals it and waits a bounded time for it to exit.
//! Tests can skip the handle entirely and call `Reconciler::run_pass`.

use crate::client::ParkingClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub type SharedClient = Arc<Mutex<ParkingClient>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between passes
    pub interval: Duration,
    /// How long the loop waits for one pass, including the wait for the
    /// client lock. The pass itself runs on the blocking pool; one that
    /// overruns is abandoned by the loop and finishes in the background,
    /// holding the client until it does. Also bounds how long `stop` waits
    /// for the loop to exit.
    pub pass_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            pass_timeout: Duration::from_secs(10),
        }
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct ReconcileScheduler {
    config: SchedulerConfig,
    running: Option<Running>,
}

impl ReconcileScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| !r.task.is_finished())
    }

    /// Spawns the loop. The first pass runs immediately. Calling `start`
    /// on a running scheduler does nothing.
    pub fn start(&mut self, client: SharedClient) {
        if self.is_running() {
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let config = self.config;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut sequence = 0u64;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }
                sequence += 1;

                // Store I/O is synchronous; keep it off the runtime workers.
                let pass = async {
                    let mut guard = client.clone().lock_owned().await;
                    tokio::task::spawn_blocking(move || guard.reconcile()).await
                };

                // Failures never end the loop; the next tick retries.
                match tokio::time::timeout(config.pass_timeout, pass).await {
                    Ok(Ok(Ok(report))) => {
                        debug!(sequence, changes = report.changes(), "Reconciliation tick completed");
                    }
                    Ok(Ok(Err(e))) => {
                        warn!(sequence, error = %e, "Reconciliation pass failed");
                    }
                    Ok(Err(e)) => {
                        warn!(sequence, error = %e, "Reconciliation pass did not complete");
                    }
                    Err(_) => {
                        warn!(
                            sequence,
                            timeout_ms = config.pass_timeout.as_millis() as u64,
                            "Reconciliation pass timed out"
                        );
                    }
                }
            }

            debug!("Reconciliation loop exited");
        });

        info!(
            interval_secs = self.config.interval.as_secs(),
            "Reconciliation scheduler started"
        );
        self.running = Some(Running { shutdown, task });
    }

    /// Signals the loop and waits up to `pass_timeout` for it to finish,
    /// aborting it otherwise.
    pub async fn stop(&mut self) {
        let Some(Running { shutdown, mut task }) = self.running.take() else {
            return;
        };

        let _ = shutdown.send(true);
        if tokio::time::timeout(self.config.pass_timeout, &mut task)
            .await
            .is_err()
        {
            warn!("Reconciliation loop did not stop in time, aborting");
            task.abort();
        }
        info!("Reconciliation scheduler stopped");
    }
}

impl Drop for ReconcileScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}
