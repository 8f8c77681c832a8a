pub mod payment_controller;
pub mod webhook_controller;

pub use payment_controller::{configure, ReverifyAck};
pub use webhook_controller::WebhookSecret;
