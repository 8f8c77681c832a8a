use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::executor::TaskExecutor;
use crate::modules::tasks::models::TaskEnvelope;

/// Fixed pool of workers draining the task queue
pub struct TaskRunner {
    executor: Arc<TaskExecutor>,
    worker_count: usize,
    shutdown: CancellationToken,
}

impl TaskRunner {
    pub fn new(executor: Arc<TaskExecutor>, worker_count: usize, shutdown: CancellationToken) -> Self {
        Self {
            executor,
            worker_count: worker_count.max(1),
            shutdown,
        }
    }

    /// Spawn the workers. They stop when the token is cancelled or every
    /// sender is gone.
    pub fn spawn(self, receiver: mpsc::Receiver<TaskEnvelope>) -> Vec<JoinHandle<()>> {
        info!(workers = self.worker_count, "Starting task runner");

        let receiver = Arc::new(Mutex::new(receiver));

        (0..self.worker_count)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&self.executor),
                    self.shutdown.clone(),
                ))
            })
            .collect()
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<TaskEnvelope>>>,
    executor: Arc<TaskExecutor>,
    shutdown: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = async { receiver.lock().await.recv().await } => next,
        };

        let Some(envelope) = next else {
            break;
        };

        debug!(worker_id, task_id = %envelope.handle.id, task = envelope.handle.task_name, "Task picked up");
        executor.run(envelope).await;
    }

    debug!(worker_id, "Task worker stopped");
}
