pub mod payment_service;

pub use payment_service::{InitiateOutcome, PaymentService, PaymentSettings, VerifyOutcome};
