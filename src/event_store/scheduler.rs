//! Periodic flush of the usage buffer
//!
//! Bounds how long an event can sit in memory under light load, when the
//! size threshold alone would never fire.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, warn};

use super::store::UsageLog;

/// Background task that flushes a usage log on a fixed period
pub(crate) struct FlushScheduler {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl FlushScheduler {
    /// Start flushing `log` every `period`, first tick one period from now
    pub(crate) fn spawn(log: Arc<UsageLog>, period: Duration) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run(log, period, stop_rx));

        Self { stop_tx, handle }
    }

    /// Signal the task to stop and wait for it to finish its current tick
    pub(crate) async fn stop(self) {
        // A send error means the task already exited
        let _ = self.stop_tx.send(());

        if let Err(e) = self.handle.await {
            error!(error = %e, "usage flush task did not shut down cleanly");
        }
    }
}

async fn run(log: Arc<UsageLog>, period: Duration, mut stop_rx: oneshot::Receiver<()>) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                flush_on_blocking_pool(&log).await;
            }

            // Explicit stop, or the owning store was dropped
            _ = &mut stop_rx => {
                debug!("usage flush task stopping");
                break;
            }
        }
    }
}

async fn flush_on_blocking_pool(log: &Arc<UsageLog>) {
    let log = Arc::clone(log);
    match tokio::task::spawn_blocking(move || log.flush()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "periodic usage flush failed; retrying next tick"),
        Err(e) => error!(error = %e, "periodic usage flush panicked"),
    }
}
