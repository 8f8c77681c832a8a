use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::core::{AppError, Result};
use crate::modules::tasks::models::{Task, TaskEnvelope, TaskHandle};

/// Work queue the orchestrator hands background work to.
///
/// Delivery is at-least-once; consumers must tolerate duplicates.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Make `task` available to workers now. Never blocks on a full queue.
    async fn enqueue(&self, task: Task) -> Result<TaskHandle>;

    /// Make `task` available to workers once `delay` has passed
    async fn enqueue_after(&self, task: Task, delay: Duration) -> Result<TaskHandle>;
}

/// In-process queue over a bounded tokio channel
///
/// Delayed tasks wait in a timer task and join the channel when due, so
/// they are lost if the process exits first; the recurring sweep and the
/// next API verify pick up whatever a lost reverify would have done.
#[derive(Clone)]
pub struct ChannelTaskQueue {
    sender: mpsc::Sender<TaskEnvelope>,
}

impl ChannelTaskQueue {
    /// Returns the queue and the receiving end for [`TaskRunner`](super::TaskRunner)
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TaskEnvelope>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TaskQueue for ChannelTaskQueue {
    async fn enqueue(&self, task: Task) -> Result<TaskHandle> {
        let envelope = TaskEnvelope::new(task, Utc::now());
        let handle = envelope.handle.clone();

        self.sender.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(envelope) => AppError::Queue(format!(
                "task queue full, dropped {}",
                envelope.handle.task_name
            )),
            TrySendError::Closed(_) => AppError::Queue("task queue closed".to_string()),
        })?;

        debug!(task_id = %handle.id, task = handle.task_name, "Task enqueued");
        Ok(handle)
    }

    async fn enqueue_after(&self, task: Task, delay: Duration) -> Result<TaskHandle> {
        if delay.is_zero() {
            return self.enqueue(task).await;
        }

        if self.sender.is_closed() {
            return Err(AppError::Queue("task queue closed".to_string()));
        }

        let due = Utc::now() + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
        let envelope = TaskEnvelope::new(task, due);
        let handle = envelope.handle.clone();
        let sender = self.sender.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let task_id = envelope.handle.id;
            let task_name = envelope.handle.task_name;
            if sender.send(envelope).await.is_err() {
                warn!(task_id = %task_id, task = task_name, "Queue closed before delayed task was due");
            }
        });

        debug!(
            task_id = %handle.id,
            task = handle.task_name,
            delay_seconds = delay.as_secs(),
            "Task scheduled"
        );
        Ok(handle)
    }
}
