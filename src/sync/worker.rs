use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use crate::sync::executor::SyncScheduler;

/// Background trigger for scheduled syncs. Re-evaluates the due-check on a
/// short tick instead of sleeping until the next sync instant, so shutdown
/// stays responsive and a rewritten schedule takes effect within one tick.
pub struct SyncWorker {
    scheduler: Arc<SyncScheduler>,
    tick: Duration,
    shutdown: watch::Receiver<bool>,
}

impl SyncWorker {
    pub fn new(
        scheduler: Arc<SyncScheduler>,
        tick: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            scheduler,
            tick,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        log::info!("sync worker started (tick {} s)", self.tick.as_secs());
        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        log::info!("sync worker shutting down");
                        break;
                    }
                }
                _ = sleep(self.tick) => {
                    if let Some(status) = self.scheduler.sync_if_due().await {
                        log::info!("scheduled sync finished: {status}");
                    }
                }
            }
        }
    }
}
