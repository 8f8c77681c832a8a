pub mod bookings;
pub mod gateways;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod tasks;
