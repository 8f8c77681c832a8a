use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::queue::TaskQueue;
use crate::modules::tasks::models::Task;

/// Enqueues the expired-payment sweep on a fixed interval
///
/// The first sweep is queued immediately at startup.
pub struct SweepScheduler {
    queue: Arc<dyn TaskQueue>,
    period: Duration,
    shutdown: CancellationToken,
}

impl SweepScheduler {
    pub fn new(queue: Arc<dyn TaskQueue>, period: Duration, shutdown: CancellationToken) -> Self {
        Self {
            queue,
            period,
            shutdown,
        }
    }

    /// Run until the token is cancelled. Spawn this as a tokio task.
    pub async fn start(self: Arc<Self>) {
        info!(period_seconds = self.period.as_secs(), "Starting payment sweep scheduler");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.queue.enqueue(Task::SweepExpiredPayments).await {
                        error!(error = %e, "Failed to enqueue payment sweep");
                    }
                }
            }
        }

        info!("Payment sweep scheduler stopped");
    }
}
