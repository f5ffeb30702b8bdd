//! Cancellable periodic background task.
//!
//! Both the metrics collection tick and the pool health-check sweep run on a
//! `PeriodicTask`: a spawned tokio loop over an interval that exits as soon as
//! its shutdown channel fires. `stop` signals and then joins the task, so once
//! it returns no further tick can run.

use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error};

#[derive(Debug)]
pub struct PeriodicTask {
    name: String,
    shutdown_tx: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `tick` every `period`. The first tick fires after one full period.
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() yields immediately on the first call
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => tick().await,
                }
            }

            debug!(task = %task_name, "Periodic task loop stopped");
        });

        debug!(task = %name, period_ms = period.as_millis() as u64, "Periodic task started");

        Self {
            name,
            shutdown_tx,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the loop to exit and wait for it to finish.
    pub async fn stop(mut self) {
        // The receiver is gone only if the loop already exited
        let _ = self.shutdown_tx.send(());

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(task = %self.name, "Periodic task panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        // A task dropped without stop() still exits on its next select
        let _ = self.shutdown_tx.send(());
    }
}
