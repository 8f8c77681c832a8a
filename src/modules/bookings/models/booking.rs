use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Property being booked; only the fields payments care about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub price_per_night: Decimal,
}

/// Account that made the booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Booking as seen by the payment subsystem. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub listing: Listing,
    pub guest: Guest,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub booked_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Nights stayed; zero or negative for malformed date ranges
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Gateway-facing booking label
    pub fn display_reference(&self) -> String {
        format!("BK-{}", self.id)
    }
}

/// Payer contact details, copied onto the payment at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub phone: Option<String>,
}

impl Payer {
    /// Full name, or the username when no name is on file
    pub fn display_name(&self) -> String {
        let full_name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full_name = full_name.trim();

        if full_name.is_empty() {
            self.username.clone()
        } else {
            full_name.to_string()
        }
    }
}

impl From<&Guest> for Payer {
    fn from(guest: &Guest) -> Self {
        Self {
            email: guest.email.clone(),
            first_name: guest.first_name.clone(),
            last_name: guest.last_name.clone(),
            username: guest.username.clone(),
            phone: None,
        }
    }
}
