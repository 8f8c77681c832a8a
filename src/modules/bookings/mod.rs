// Bookings are owned by the listings service; this module only reads them.

pub mod models;
pub mod repositories;

pub use models::{Booking, Guest, Listing, Payer};
pub use repositories::{BookingRepository, InMemoryBookingRepository, MySqlBookingRepository};
