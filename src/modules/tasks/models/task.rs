use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Background work item
///
/// Serialized as `{"task": "...", "payload": {...}}` so the same values can
/// travel through an external broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", content = "payload", rename_all = "snake_case")]
pub enum Task {
    NotifyPaymentCompleted { payment_id: String },
    NotifyPaymentFailed { payment_id: String },
    NotifyBookingConfirmed { booking_id: i64 },
    /// Poll the gateway again; `attempt` indexes the reverify schedule
    ReverifyPayment { payment_id: String, attempt: u32 },
    SweepExpiredPayments,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::NotifyPaymentCompleted { .. } => "notify_payment_completed",
            Task::NotifyPaymentFailed { .. } => "notify_payment_failed",
            Task::NotifyBookingConfirmed { .. } => "notify_booking_confirmed",
            Task::ReverifyPayment { .. } => "reverify_payment",
            Task::SweepExpiredPayments => "sweep_expired_payments",
        }
    }
}

/// Receipt for an enqueued task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskHandle {
    pub id: Uuid,
    pub task_name: &'static str,
    /// Earliest time a worker will see the task
    pub scheduled_for: DateTime<Utc>,
}

/// What travels through the queue
#[derive(Debug, Clone)]
pub struct TaskEnvelope {
    pub handle: TaskHandle,
    pub task: Task,
}

impl TaskEnvelope {
    pub fn new(task: Task, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            handle: TaskHandle {
                id: Uuid::new_v4(),
                task_name: task.name(),
                scheduled_for,
            },
            task,
        }
    }
}
