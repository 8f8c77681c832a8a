use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::core::{AppError, Result};
use crate::modules::bookings::repositories::BookingRepository;
use crate::modules::notifications::services::{email_templates, Notifier};
use crate::modules::payments::models::PaymentStatus;
use crate::modules::payments::services::PaymentService;
use crate::modules::tasks::models::{Task, TaskEnvelope};

/// How a task run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Done,
    /// Nothing to do; the entity moved on or disappeared
    Skipped(String),
    /// Another attempt was queued
    Rescheduled { attempt: u32, delay: Duration },
    /// Logged and dropped
    Failed(String),
}

/// Runs tasks against the orchestrator and notifier
///
/// Every task re-reads its entity, so running one twice is harmless.
pub struct TaskExecutor {
    payments: Arc<PaymentService>,
    bookings: Arc<dyn BookingRepository>,
    notifier: Arc<dyn Notifier>,
    reverify_schedule: Vec<Duration>,
    payment_expiry: chrono::Duration,
}

impl TaskExecutor {
    pub fn new(
        payments: Arc<PaymentService>,
        bookings: Arc<dyn BookingRepository>,
        notifier: Arc<dyn Notifier>,
        reverify_schedule: Vec<Duration>,
        payment_expiry: chrono::Duration,
    ) -> Self {
        Self {
            payments,
            bookings,
            notifier,
            reverify_schedule,
            payment_expiry,
        }
    }

    /// Run one queued task. Never fails; errors are logged here.
    pub async fn run(&self, envelope: TaskEnvelope) -> TaskOutcome {
        let task_id = envelope.handle.id;
        let task_name = envelope.handle.task_name;

        let outcome = match self.execute(&envelope.task).await {
            Ok(outcome) => outcome,
            Err(AppError::NotFound(what)) => {
                warn!(task_id = %task_id, task = task_name, missing = %what, "Task target not found");
                TaskOutcome::Skipped(what)
            }
            Err(e) => {
                error!(task_id = %task_id, task = task_name, error = %e, "Task failed");
                TaskOutcome::Failed(e.to_string())
            }
        };

        match &outcome {
            TaskOutcome::Done => info!(task_id = %task_id, task = task_name, "Task completed"),
            TaskOutcome::Skipped(reason) => {
                debug!(task_id = %task_id, task = task_name, reason = %reason, "Task skipped")
            }
            TaskOutcome::Rescheduled { attempt, delay } => info!(
                task_id = %task_id,
                task = task_name,
                attempt,
                delay_seconds = delay.as_secs(),
                "Task rescheduled"
            ),
            TaskOutcome::Failed(_) => {}
        }

        outcome
    }

    /// Run one task and report errors to the caller
    pub async fn execute(&self, task: &Task) -> Result<TaskOutcome> {
        match task {
            Task::NotifyPaymentCompleted { payment_id } => {
                self.notify_payment(payment_id, PaymentStatus::Completed).await
            }
            Task::NotifyPaymentFailed { payment_id } => {
                self.notify_payment(payment_id, PaymentStatus::Failed).await
            }
            Task::NotifyBookingConfirmed { booking_id } => self.notify_booking(*booking_id).await,
            Task::ReverifyPayment {
                payment_id,
                attempt,
            } => self.reverify(payment_id, *attempt).await,
            Task::SweepExpiredPayments => {
                self.payments
                    .expire_stale_pending(self.payment_expiry)
                    .await?;
                Ok(TaskOutcome::Done)
            }
        }
    }

    async fn notify_payment(&self, payment_id: &str, expected: PaymentStatus) -> Result<TaskOutcome> {
        let payment = self.payments.get_payment(payment_id).await?;

        if payment.status != expected {
            return Ok(TaskOutcome::Skipped(format!(
                "payment {} is {}, not {}",
                payment.id, payment.status, expected
            )));
        }

        let booking = self
            .bookings
            .find_by_id(payment.booking_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Booking {}", payment.booking_id)))?;

        let message = match expected {
            PaymentStatus::Completed => email_templates::payment_completed(&payment, &booking),
            _ => email_templates::payment_failed(&payment, &booking),
        };

        self.notifier.send(&message).await?;
        Ok(TaskOutcome::Done)
    }

    async fn notify_booking(&self, booking_id: i64) -> Result<TaskOutcome> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Booking {}", booking_id)))?;

        let payments = self.payments.list_for_booking(booking_id).await?;
        let pending = payments.iter().find(|p| p.status.is_active());

        let message = email_templates::booking_confirmed(&booking, pending);
        self.notifier.send(&message).await?;
        Ok(TaskOutcome::Done)
    }

    async fn reverify(&self, payment_id: &str, attempt: u32) -> Result<TaskOutcome> {
        let payment = self.payments.get_payment(payment_id).await?;

        if payment.is_terminal() {
            return Ok(TaskOutcome::Skipped(format!(
                "payment {} already {}",
                payment.id, payment.status
            )));
        }

        if payment.gateway_transaction_ref.is_none() {
            return Ok(TaskOutcome::Skipped(format!(
                "payment {} was never initiated",
                payment.id
            )));
        }

        match self.payments.verify(payment_id).await {
            Ok(outcome) if outcome.status.is_terminal() => Ok(TaskOutcome::Done),
            Ok(_) => Ok(self.retry_later(payment_id, attempt).await),
            Err(e) if e.is_retryable() => {
                warn!(payment_id, attempt, error = %e, "Reverify hit a gateway error");
                Ok(self.retry_later(payment_id, attempt).await)
            }
            Err(e) => Err(e),
        }
    }

    /// Queue the next attempt, or give up once the schedule is exhausted
    async fn retry_later(&self, payment_id: &str, attempt: u32) -> TaskOutcome {
        let next = attempt.saturating_add(1);

        match self.reverify_schedule.get(next as usize) {
            Some(&delay) => {
                self.payments.schedule_reverify(payment_id, next, delay).await;
                TaskOutcome::Rescheduled {
                    attempt: next,
                    delay,
                }
            }
            None => {
                warn!(payment_id, attempts = next, "Reverify schedule exhausted");
                TaskOutcome::Skipped(format!(
                    "payment {} still unsettled after {} attempts",
                    payment_id, next
                ))
            }
        }
    }
}
