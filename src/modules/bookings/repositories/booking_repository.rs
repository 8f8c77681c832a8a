use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySqlPool};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::core::{AppError, Result};
use crate::modules::bookings::models::{Booking, Guest, Listing};

/// Read access to bookings owned by the listings/bookings service
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Find booking by ID, with its listing and guest
    async fn find_by_id(&self, id: i64) -> Result<Option<Booking>>;
}

/// Bookings read straight from the shared MySQL schema
pub struct MySqlBookingRepository {
    pool: MySqlPool,
}

impl MySqlBookingRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct BookingRow {
    id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    booked_at: Option<DateTime<Utc>>,
    listing_id: i64,
    listing_title: String,
    price_per_night: Decimal,
    user_id: i64,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            listing: Listing {
                id: row.listing_id,
                title: row.listing_title,
                price_per_night: row.price_per_night,
            },
            guest: Guest {
                id: row.user_id,
                username: row.username,
                email: row.email,
                first_name: row.first_name,
                last_name: row.last_name,
            },
            start_date: row.start_date,
            end_date: row.end_date,
            booked_at: row.booked_at,
        }
    }
}

#[async_trait]
impl BookingRepository for MySqlBookingRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT
                b.id, b.start_date, b.end_date, b.booked_at,
                l.id AS listing_id, l.title AS listing_title, l.price_per_night,
                u.id AS user_id, u.username, u.email, u.first_name, u.last_name
            FROM bookings b
            JOIN listings l ON l.id = b.listing_id
            JOIN users u ON u.id = b.user_id
            WHERE b.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch booking: {}", e)))?;

        Ok(row.map(Booking::from))
    }
}

/// Process-local booking store for single-instance runs and tests
#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<i64, Booking>>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, booking: Booking) {
        self.bookings.write().await.insert(booking.id, booking);
    }

    pub async fn remove(&self, id: i64) -> Option<Booking> {
        self.bookings.write().await.remove(&id)
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }
}
