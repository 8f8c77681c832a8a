use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::super::models::{CheckoutDetails, Initiation, Payment, PaymentStatus};
use super::super::repositories::PaymentRepository;
use crate::config::Config;
use crate::core::{AppError, Currency, Result};
use crate::modules::bookings::models::{Booking, Payer};
use crate::modules::gateways::{normalize_status, InitializeRequest, PaymentGateway};
use crate::modules::tasks::models::{Task, TaskHandle};
use crate::modules::tasks::services::TaskQueue;

/// Values handed to the gateway at checkout
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: Currency,
    pub callback_url: String,
    /// The payment reference is appended as the final path segment
    pub return_base_url: String,
    pub checkout_title: String,
    /// Delay before the first background re-verification after initiation
    pub first_reverify_delay: Duration,
}

impl PaymentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            currency: config.app.default_currency,
            callback_url: config.chapa.callback_url(),
            return_base_url: config.chapa.return_base_url.trim_end_matches('/').to_string(),
            checkout_title: config.chapa.checkout_title.clone(),
            first_reverify_delay: config
                .tasks
                .reverify_schedule()
                .first()
                .copied()
                .unwrap_or(Duration::from_secs(60)),
        }
    }

    fn return_url(&self, reference: &str) -> String {
        format!("{}/{}", self.return_base_url, reference)
    }
}

/// Result of a successful initiation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitiateOutcome {
    pub payment_id: String,
    pub reference: String,
    pub checkout_url: String,
    pub gateway_reference: String,
    pub status: PaymentStatus,
}

/// Result of a gateway verification
///
/// `changed` is true only for the caller whose compare-and-set moved the
/// payment; concurrent verifiers of the same remote state see `false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyOutcome {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub previous_status: PaymentStatus,
    pub changed: bool,
    pub remote_status: String,
    pub amount: Decimal,
    pub currency: String,
    pub gateway_reference: String,
}

/// Payment orchestrator
///
/// Owns the payment state machine. Every status change goes through a
/// conditional update so concurrent requests and task workers cannot
/// double-apply a transition.
pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    queue: Arc<dyn TaskQueue>,
    settings: PaymentSettings,
}

impl PaymentService {
    /// Create a new PaymentService
    ///
    /// # Arguments
    /// * `payments` - Payment store
    /// * `gateway` - Checkout gateway client
    /// * `queue` - Background task queue for notifications and re-verification
    /// * `settings` - Checkout URLs, currency and reverify delay
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        queue: Arc<dyn TaskQueue>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            payments,
            gateway,
            queue,
            settings,
        }
    }

    /// Create the pending payment for a freshly created booking
    ///
    /// Amount is `nights × price_per_night` at currency scale. Also enqueues
    /// the booking confirmation email; a queue failure is logged only.
    ///
    /// # Errors
    /// * `422 InvalidBooking` - Stay of zero or negative nights, or non-positive price
    /// * `409 Conflict` - Booking already has a pending, processing or completed payment
    pub async fn create_for_booking(&self, booking: &Booking, payer: &Payer) -> Result<Payment> {
        let nights = booking.nights();
        if nights <= 0 {
            tracing::warn!(booking_id = booking.id, nights, "Rejected booking with empty stay");
            return Err(AppError::invalid_booking(format!(
                "Booking {} must end after it starts (got {} nights)",
                booking.id, nights
            )));
        }

        let price = booking.listing.price_per_night;
        if price <= Decimal::ZERO {
            tracing::warn!(booking_id = booking.id, %price, "Rejected booking with non-positive price");
            return Err(AppError::invalid_booking(format!(
                "Listing {} has a non-positive nightly price",
                booking.listing.id
            )));
        }

        self.ensure_no_active_payment(booking.id, None).await?;

        let amount = self.settings.currency.round(price * Decimal::from(nights));
        let payment = Payment::new(booking.id, amount, self.settings.currency, payer)?;
        let payment = self.payments.insert(&payment).await?;

        tracing::info!(
            payment_id = %payment.id,
            reference = %payment.reference,
            booking_id = booking.id,
            amount = %payment.amount,
            currency = %payment.currency,
            "Payment created"
        );

        self.enqueue_quietly(Task::NotifyBookingConfirmed {
            booking_id: booking.id,
        })
        .await;

        Ok(payment)
    }

    /// Open a checkout session with the gateway, without extra customer input
    pub async fn initiate(&self, payment_id: &str) -> Result<InitiateOutcome> {
        self.initiate_with(payment_id, CheckoutDetails::default())
            .await
    }

    /// Open a checkout session with the gateway
    ///
    /// On success the payment moves to `processing` with the checkout URL,
    /// gateway reference and any given payment method or phone recorded in
    /// one write, and a delayed re-verification is scheduled. On gateway
    /// failure the payment moves to `failed`.
    ///
    /// # Errors
    /// * `400 Validation` - Phone number too long
    /// * `404 NotFound` - Unknown payment
    /// * `409 InvalidTransition` - Payment is not pending
    /// * `409 Conflict` - Another request initiated the payment first
    /// * `502 Gateway` - Gateway unreachable or rejected the request
    pub async fn initiate_with(
        &self,
        payment_id: &str,
        details: CheckoutDetails,
    ) -> Result<InitiateOutcome> {
        let details = details.normalized()?;
        let payment = self.get_payment(payment_id).await?;

        if payment.status != PaymentStatus::Pending {
            return Err(AppError::InvalidTransition {
                from: payment.status,
                to: PaymentStatus::Processing,
            });
        }

        let request = InitializeRequest {
            amount: payment.amount,
            currency: payment.currency,
            email: payment.customer_email.clone(),
            first_name: payment.customer_first_name().to_string(),
            last_name: payment.customer_last_name(),
            phone_number: details
                .customer_phone
                .clone()
                .or_else(|| payment.customer_phone.clone()),
            tx_ref: payment.reference.clone(),
            callback_url: self.settings.callback_url.clone(),
            return_url: self.settings.return_url(&payment.reference),
            title: self.settings.checkout_title.clone(),
            description: format!("Payment for booking: BK-{}", payment.booking_id),
        };

        let response = match self.gateway.initialize(request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(
                    payment_id = %payment.id,
                    reference = %payment.reference,
                    gateway = self.gateway.name(),
                    error = %error,
                    "Gateway initialization failed"
                );

                let failed = self
                    .payments
                    .transition_status(&payment.id, PaymentStatus::Pending, PaymentStatus::Failed)
                    .await?;
                if !failed {
                    tracing::warn!(payment_id = %payment.id, "Payment left pending state during initiation");
                }

                return Err(AppError::Gateway(error));
            }
        };

        let initiation = Initiation {
            gateway_reference: response.gateway_reference.clone(),
            checkout_url: response.checkout_url.clone(),
            payment_method: details.payment_method,
            customer_phone: details.customer_phone,
        };

        let recorded = self.payments.mark_initiated(&payment.id, &initiation).await?;
        if !recorded {
            tracing::warn!(payment_id = %payment.id, "Payment was initiated concurrently");
            return Err(AppError::conflict(format!(
                "Payment {} is no longer pending",
                payment.id
            )));
        }

        tracing::info!(
            payment_id = %payment.id,
            reference = %payment.reference,
            gateway_reference = %response.gateway_reference,
            payment_method = ?initiation.payment_method,
            "Payment initiated"
        );

        self.schedule_reverify(&payment.id, 0, self.settings.first_reverify_delay)
            .await;

        Ok(InitiateOutcome {
            payment_id: payment.id,
            reference: payment.reference,
            checkout_url: response.checkout_url,
            gateway_reference: response.gateway_reference,
            status: PaymentStatus::Processing,
        })
    }

    /// Ask the gateway for the payment's state and apply it
    ///
    /// Terminal payments never change; the gateway is still consulted and
    /// its answer returned. Only the caller that wins the status update
    /// enqueues the completion or failure email.
    ///
    /// # Errors
    /// * `404 NotFound` - Unknown payment
    /// * `409 MissingReference` - Payment was never initiated
    /// * `502 Gateway` - Gateway unreachable; local status unchanged
    pub async fn verify(&self, payment_id: &str) -> Result<VerifyOutcome> {
        let payment = self.get_payment(payment_id).await?;

        let gateway_reference = payment.gateway_transaction_ref.clone().ok_or_else(|| {
            AppError::MissingReference(format!(
                "Payment {} has not been initiated with the gateway",
                payment.id
            ))
        })?;

        let remote = self.gateway.verify(&gateway_reference).await.map_err(|error| {
            tracing::warn!(
                payment_id = %payment.id,
                gateway_reference = %gateway_reference,
                error = %error,
                "Gateway verification failed"
            );
            AppError::Gateway(error)
        })?;

        let previous_status = payment.status;
        let normalized = normalize_status(&remote.remote_status);

        let (status, changed) = if !previous_status.can_transition_to(normalized) {
            (previous_status, false)
        } else if self
            .payments
            .transition_status(&payment.id, previous_status, normalized)
            .await?
        {
            (normalized, true)
        } else {
            // Another verifier moved it first; report what they stored
            let current = self.get_payment(&payment.id).await?;
            (current.status, false)
        };

        if changed {
            tracing::info!(
                payment_id = %payment.id,
                from = %previous_status,
                to = %status,
                remote_status = %remote.remote_status,
                "Payment status updated"
            );

            match status {
                PaymentStatus::Completed => {
                    self.record_transaction_id(&payment.id, &remote.gateway_reference)
                        .await;
                    self.enqueue_quietly(Task::NotifyPaymentCompleted {
                        payment_id: payment.id.clone(),
                    })
                    .await
                }
                PaymentStatus::Failed => {
                    self.enqueue_quietly(Task::NotifyPaymentFailed {
                        payment_id: payment.id.clone(),
                    })
                    .await
                }
                _ => {}
            }
        } else {
            tracing::debug!(
                payment_id = %payment.id,
                status = %status,
                remote_status = %remote.remote_status,
                "Payment status unchanged"
            );
        }

        if normalized == PaymentStatus::Completed
            && (remote.amount != payment.amount
                || !remote
                    .currency
                    .eq_ignore_ascii_case(&payment.currency.to_string()))
        {
            tracing::warn!(
                payment_id = %payment.id,
                expected_amount = %payment.amount,
                expected_currency = %payment.currency,
                remote_amount = %remote.amount,
                remote_currency = %remote.currency,
                "Gateway reported a different amount or currency"
            );
        }

        Ok(VerifyOutcome {
            payment_id: payment.id,
            status,
            previous_status,
            changed,
            remote_status: remote.remote_status,
            amount: remote.amount,
            currency: remote.currency,
            gateway_reference: remote.gateway_reference,
        })
    }

    /// Fail every pending payment created more than `max_age` ago
    ///
    /// # Returns
    /// * Number of payments moved to `failed`
    pub async fn expire_stale_pending(&self, max_age: chrono::Duration) -> Result<u64> {
        let cutoff = Utc::now() - max_age;
        let expired = self.payments.expire_pending_before(cutoff).await?;

        if expired > 0 {
            tracing::info!(expired, cutoff = %cutoff, "Expired stale pending payments");
        } else {
            tracing::debug!(cutoff = %cutoff, "No stale pending payments");
        }

        Ok(expired)
    }

    /// Put a failed, never-initiated payment back to `pending` for a retry
    ///
    /// Keeps the reference and clears the checkout URL. The expiry window
    /// restarts, so the sweep does not fail the retry straight away.
    ///
    /// # Errors
    /// * `409 InvalidTransition` - Payment is not failed, or reached the gateway
    /// * `409 Conflict` - Booking already has another active payment
    pub async fn reset_to_pending(&self, payment_id: &str) -> Result<Payment> {
        let payment = self.get_payment(payment_id).await?;

        if payment.status != PaymentStatus::Failed || payment.gateway_transaction_ref.is_some() {
            return Err(AppError::InvalidTransition {
                from: payment.status,
                to: PaymentStatus::Pending,
            });
        }

        self.ensure_no_active_payment(payment.booking_id, Some(&payment.id))
            .await?;

        if !self.payments.reset_to_pending(&payment.id).await? {
            return Err(AppError::conflict(format!(
                "Payment {} changed while resetting",
                payment.id
            )));
        }

        tracing::info!(payment_id = %payment.id, reference = %payment.reference, "Payment reset to pending");

        self.get_payment(&payment.id).await
    }

    /// Schedule a gateway re-check for the payment with this reference
    ///
    /// Used by the gateway callback and webhook, whose own status claims are
    /// never trusted. Returns `None` when the payment is already terminal.
    pub async fn request_reverify(&self, reference: &str) -> Result<Option<TaskHandle>> {
        let payment = self.get_by_reference(reference).await?;

        if payment.is_terminal() {
            tracing::debug!(
                payment_id = %payment.id,
                status = %payment.status,
                "Skipping reverify of terminal payment"
            );
            return Ok(None);
        }

        let handle = self
            .queue
            .enqueue(Task::ReverifyPayment {
                payment_id: payment.id.clone(),
                attempt: 0,
            })
            .await?;

        tracing::info!(payment_id = %payment.id, task_id = %handle.id, "Reverify requested");
        Ok(Some(handle))
    }

    pub async fn get_payment(&self, payment_id: &str) -> Result<Payment> {
        self.payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payment '{}' not found", payment_id)))
    }

    pub async fn get_by_reference(&self, reference: &str) -> Result<Payment> {
        self.payments
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Payment with reference '{}' not found", reference))
            })
    }

    /// Payments for a booking, newest first
    pub async fn list_for_booking(&self, booking_id: i64) -> Result<Vec<Payment>> {
        self.payments.find_by_booking_id(booking_id).await
    }

    /// Schedule a reverify attempt; failures are logged only
    pub async fn schedule_reverify(&self, payment_id: &str, attempt: u32, delay: Duration) {
        let task = Task::ReverifyPayment {
            payment_id: payment_id.to_string(),
            attempt,
        };

        if let Err(e) = self.queue.enqueue_after(task, delay).await {
            tracing::warn!(payment_id, attempt, error = %e, "Failed to schedule reverify");
        }
    }

    async fn ensure_no_active_payment(&self, booking_id: i64, except: Option<&str>) -> Result<()> {
        let existing = self.payments.find_by_booking_id(booking_id).await?;

        if let Some(blocking) = existing.iter().find(|p| {
            Some(p.id.as_str()) != except
                && (p.status.is_active() || p.status == PaymentStatus::Completed)
        }) {
            return Err(AppError::conflict(format!(
                "Booking {} already has a {} payment ({})",
                booking_id, blocking.status, blocking.reference
            )));
        }

        Ok(())
    }

    async fn record_transaction_id(&self, payment_id: &str, transaction_id: &str) {
        match self
            .payments
            .record_transaction_id(payment_id, transaction_id)
            .await
        {
            Ok(true) => tracing::debug!(payment_id, transaction_id, "Transaction id recorded"),
            Ok(false) => {}
            Err(e) => tracing::warn!(payment_id, error = %e, "Failed to record transaction id"),
        }
    }

    async fn enqueue_quietly(&self, task: Task) {
        let name = task.name();
        match self.queue.enqueue(task).await {
            Ok(handle) => tracing::debug!(task = name, task_id = %handle.id, "Task enqueued"),
            Err(e) => tracing::warn!(task = name, error = %e, "Failed to enqueue task"),
        }
    }
}
