pub mod booking;

pub use booking::{Booking, Guest, Listing, Payer};
