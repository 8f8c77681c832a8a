pub mod payment;

pub use payment::{CheckoutDetails, Initiation, Payment, PaymentMethod, PaymentStatus};
