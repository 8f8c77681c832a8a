//! StayPay booking payment service
//!
//! Payment lifecycle for travel bookings: payment creation, Chapa checkout
//! and verification, background notifications and the expiry sweep.

pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;

use actix_web::web;

// Re-export commonly used types
pub use modules::bookings;
pub use modules::gateways;
pub use modules::payments;
pub use modules::tasks;

/// Register every HTTP route plus extractor error handling
///
/// Handlers expect `web::Data<Arc<PaymentService>>`,
/// `web::Data<Arc<dyn BookingRepository>>` and `web::Data<WebhookSecret>` in
/// app data; `/ready` also needs the pool.
pub fn configure(cfg: &mut web::ServiceConfig) {
    middleware::extractor_config(cfg);
    modules::health::controllers::configure(cfg);
    modules::payments::controllers::configure(cfg);
}
