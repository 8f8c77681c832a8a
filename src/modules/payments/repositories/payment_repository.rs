use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySqlPool};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::Mutex;

use crate::core::{AppError, Currency, Result};
use crate::modules::payments::models::{Initiation, Payment, PaymentMethod, PaymentStatus};

/// Persistence for payments
///
/// Every mutating method is a single conditional write: it applies only if
/// the row is still in the expected state and reports whether it did. That is
/// the compare-and-set the orchestrator relies on when requests and task
/// workers race on the same payment.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Persist a new payment. Duplicate `reference` is a `Conflict`.
    async fn insert(&self, payment: &Payment) -> Result<Payment>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>>;

    /// All payments for a booking, newest first
    async fn find_by_booking_id(&self, booking_id: i64) -> Result<Vec<Payment>>;

    /// `pending → processing`, storing the gateway reference, checkout URL
    /// and the customer's checkout details in the same write. No-op unless
    /// the payment is pending with no gateway reference yet.
    async fn mark_initiated(&self, id: &str, initiation: &Initiation) -> Result<bool>;

    /// Move `id` from `from` to `to` if it is still in `from`
    async fn transition_status(
        &self,
        id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<bool>;

    /// Store the gateway's transaction id unless one is already recorded
    async fn record_transaction_id(&self, id: &str, transaction_id: &str) -> Result<bool>;

    /// `failed → pending` for payments the gateway never accepted. Restarts
    /// `pending_since` so the sweep gives the retry a full expiry window.
    async fn reset_to_pending(&self, id: &str) -> Result<bool>;

    /// Fail every payment pending since before `cutoff`; returns how many
    async fn expire_pending_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Repository for payment persistence in MySQL
pub struct MySqlPaymentRepository {
    pool: MySqlPool,
}

const PAYMENT_COLUMNS: &str = r#"
    id, reference, booking_id, amount, currency, status, payment_method,
    transaction_id, gateway_transaction_ref, checkout_url,
    customer_email, customer_name, customer_phone, created_at, updated_at,
    pending_since
"#;

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: String,
    reference: String,
    booking_id: i64,
    amount: Decimal,
    currency: String,
    status: String,
    payment_method: Option<String>,
    transaction_id: Option<String>,
    gateway_transaction_ref: Option<String>,
    checkout_url: Option<String>,
    customer_email: String,
    customer_name: String,
    customer_phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    pending_since: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Payment {
            id: row.id,
            reference: row.reference,
            booking_id: row.booking_id,
            amount: row.amount,
            currency: Currency::from_str(&row.currency).map_err(AppError::Internal)?,
            status: PaymentStatus::from_str(&row.status).map_err(AppError::Internal)?,
            payment_method: row
                .payment_method
                .as_deref()
                .map(PaymentMethod::from_str)
                .transpose()
                .map_err(AppError::Internal)?,
            transaction_id: row.transaction_id,
            gateway_transaction_ref: row.gateway_transaction_ref,
            checkout_url: row.checkout_url,
            customer_email: row.customer_email,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            created_at: row.created_at,
            updated_at: row.updated_at,
            pending_since: row.pending_since,
        })
    }
}

impl MySqlPaymentRepository {
    /// Create a new MySqlPaymentRepository
    ///
    /// # Arguments
    /// * `pool` - Database connection pool
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE {} = ?", PAYMENT_COLUMNS, column);

        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch payment by {}: {}", column, e)))?;

        row.map(Payment::try_from).transpose()
    }
}

#[async_trait]
impl PaymentRepository for MySqlPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<Payment> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, reference, booking_id, amount, currency, status, payment_method,
                transaction_id, gateway_transaction_ref, checkout_url,
                customer_email, customer_name, customer_phone, created_at, updated_at,
                pending_since
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.reference)
        .bind(payment.booking_id)
        .bind(payment.amount)
        .bind(payment.currency.to_string())
        .bind(payment.status.as_str())
        .bind(payment.payment_method.map(|m| m.to_string()))
        .bind(&payment.transaction_id)
        .bind(&payment.gateway_transaction_ref)
        .bind(&payment.checkout_url)
        .bind(&payment.customer_email)
        .bind(&payment.customer_name)
        .bind(&payment.customer_phone)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .bind(payment.pending_since)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::conflict(format!(
                        "Payment with reference '{}' already exists",
                        payment.reference
                    ));
                }
            }
            AppError::Internal(format!("Failed to create payment: {}", e))
        })?;

        Ok(payment.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>> {
        self.fetch_one_by("id", id).await
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>> {
        self.fetch_one_by("reference", reference).await
    }

    async fn find_by_booking_id(&self, booking_id: i64) -> Result<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE booking_id = ? ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        );

        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::Internal(format!("Failed to fetch payments for booking: {}", e))
            })?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn mark_initiated(&self, id: &str, initiation: &Initiation) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET gateway_transaction_ref = ?, checkout_url = ?, status = 'processing',
                payment_method = COALESCE(?, payment_method),
                customer_phone = COALESCE(?, customer_phone),
                updated_at = ?
            WHERE id = ? AND status = 'pending' AND gateway_transaction_ref IS NULL
            "#,
        )
        .bind(&initiation.gateway_reference)
        .bind(&initiation.checkout_url)
        .bind(initiation.payment_method.map(|m| m.to_string()))
        .bind(&initiation.customer_phone)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to record payment initiation: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn transition_status(
        &self,
        id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to update payment status: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_transaction_id(&self, id: &str, transaction_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET transaction_id = ?, updated_at = ?
            WHERE id = ? AND transaction_id IS NULL
            "#,
        )
        .bind(transaction_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to record transaction id: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn reset_to_pending(&self, id: &str) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'pending', checkout_url = NULL, pending_since = ?, updated_at = ?
            WHERE id = ? AND status = 'failed' AND gateway_transaction_ref IS NULL
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to reset payment: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn expire_pending_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed', updated_at = ?
            WHERE status = 'pending' AND pending_since < ?
            "#,
        )
        .bind(Utc::now())
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to expire pending payments: {}", e)))?;

        Ok(result.rows_affected())
    }
}

/// Process-local payment store for single-instance runs and tests.
///
/// One mutex guards the whole map, so each conditional write is atomic the
/// same way a single UPDATE statement is.
#[derive(Default)]
pub struct InMemoryPaymentRepository {
    payments: Mutex<HashMap<String, Payment>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.payments.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.payments.lock().await.is_empty()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<Payment> {
        let mut payments = self.payments.lock().await;

        if payments.values().any(|p| p.reference == payment.reference) {
            return Err(AppError::conflict(format!(
                "Payment with reference '{}' already exists",
                payment.reference
            )));
        }
        if payments.contains_key(&payment.id) {
            return Err(AppError::conflict(format!(
                "Payment with id '{}' already exists",
                payment.id
            )));
        }

        payments.insert(payment.id.clone(), payment.clone());
        Ok(payment.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>> {
        Ok(self.payments.lock().await.get(id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>> {
        Ok(self
            .payments
            .lock()
            .await
            .values()
            .find(|p| p.reference == reference)
            .cloned())
    }

    async fn find_by_booking_id(&self, booking_id: i64) -> Result<Vec<Payment>> {
        let mut found: Vec<Payment> = self
            .payments
            .lock()
            .await
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();

        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn mark_initiated(&self, id: &str, initiation: &Initiation) -> Result<bool> {
        let mut payments = self.payments.lock().await;

        match payments.get_mut(id) {
            Some(payment)
                if payment.status == PaymentStatus::Pending
                    && payment.gateway_transaction_ref.is_none() =>
            {
                payment.gateway_transaction_ref = Some(initiation.gateway_reference.clone());
                payment.checkout_url = Some(initiation.checkout_url.clone());
                if initiation.payment_method.is_some() {
                    payment.payment_method = initiation.payment_method;
                }
                if initiation.customer_phone.is_some() {
                    payment.customer_phone = initiation.customer_phone.clone();
                }
                payment.status = PaymentStatus::Processing;
                payment.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition_status(
        &self,
        id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<bool> {
        let mut payments = self.payments.lock().await;

        match payments.get_mut(id) {
            Some(payment) if payment.status == from => {
                payment.status = to;
                payment.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_transaction_id(&self, id: &str, transaction_id: &str) -> Result<bool> {
        let mut payments = self.payments.lock().await;

        match payments.get_mut(id) {
            Some(payment) if payment.transaction_id.is_none() => {
                payment.transaction_id = Some(transaction_id.to_string());
                payment.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reset_to_pending(&self, id: &str) -> Result<bool> {
        let mut payments = self.payments.lock().await;

        match payments.get_mut(id) {
            Some(payment)
                if payment.status == PaymentStatus::Failed
                    && payment.gateway_transaction_ref.is_none() =>
            {
                let now = Utc::now();
                payment.status = PaymentStatus::Pending;
                payment.checkout_url = None;
                payment.pending_since = now;
                payment.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_pending_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut payments = self.payments.lock().await;
        let now = Utc::now();
        let mut expired = 0;

        for payment in payments.values_mut() {
            if payment.status == PaymentStatus::Pending && payment.pending_since < cutoff {
                payment.status = PaymentStatus::Failed;
                payment.updated_at = now;
                expired += 1;
            }
        }

        Ok(expired)
    }
}
