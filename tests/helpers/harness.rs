// PaymentService wired to in-memory collaborators

use chrono::Duration as ChronoDuration;
use staypay::core::Currency;
use staypay::modules::bookings::{BookingRepository, InMemoryBookingRepository};
use staypay::modules::payments::repositories::InMemoryPaymentRepository;
use staypay::modules::payments::services::{PaymentService, PaymentSettings};
use staypay::modules::tasks::TaskExecutor;
use std::sync::Arc;
use std::time::Duration;

use super::recording::{RecordingNotifier, RecordingQueue};
use super::scripted_gateway::ScriptedGateway;

pub const REVERIFY_SCHEDULE: [u64; 3] = [60, 300, 1800];

pub struct TestHarness {
    pub service: Arc<PaymentService>,
    pub payments: Arc<InMemoryPaymentRepository>,
    pub bookings: Arc<InMemoryBookingRepository>,
    pub gateway: Arc<ScriptedGateway>,
    pub queue: Arc<RecordingQueue>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn test_settings() -> PaymentSettings {
    PaymentSettings {
        currency: Currency::ETB,
        callback_url: "http://localhost:8000/api/payments/callback".to_string(),
        return_base_url: "http://localhost:3000/payment/success".to_string(),
        checkout_title: "Travel Booking".to_string(),
        first_reverify_delay: Duration::from_secs(REVERIFY_SCHEDULE[0]),
    }
}

impl TestHarness {
    pub fn new() -> Self {
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let queue = Arc::new(RecordingQueue::new());

        let service = Arc::new(PaymentService::new(
            payments.clone(),
            gateway.clone(),
            queue.clone(),
            test_settings(),
        ));

        Self {
            service,
            payments,
            bookings: Arc::new(InMemoryBookingRepository::new()),
            gateway,
            queue,
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    /// Bookings as handlers receive them from app data
    pub fn booking_repository(&self) -> Arc<dyn BookingRepository> {
        self.bookings.clone()
    }

    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor::new(
            self.service.clone(),
            self.bookings.clone(),
            self.notifier.clone(),
            REVERIFY_SCHEDULE.iter().copied().map(Duration::from_secs).collect(),
            ChronoDuration::hours(24),
        )
    }
}
