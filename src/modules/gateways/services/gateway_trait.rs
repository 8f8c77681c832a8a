use crate::core::Currency;
use crate::modules::payments::models::PaymentStatus;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Checkout gateway contract: start a hosted checkout, then poll its status.
///
/// Implementations never panic on remote failures; every transport or
/// protocol problem comes back as a [`GatewayError`].
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session for `request.tx_ref`
    async fn initialize(
        &self,
        request: InitializeRequest,
    ) -> Result<InitializeResponse, GatewayError>;

    /// Fetch the gateway's view of a transaction. Read-only and idempotent.
    async fn verify(&self, gateway_reference: &str) -> Result<VerifyResponse, GatewayError>;

    /// Get gateway name
    fn name(&self) -> &str;
}

/// Checkout initialization data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub amount: Decimal,
    pub currency: Currency,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Client-side payment reference, used by the gateway as idempotency key
    pub tx_ref: String,
    pub callback_url: String,
    pub return_url: String,
    pub title: String,
    pub description: String,
}

/// Successful checkout initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub checkout_url: String,
    /// Key for all later verify calls
    pub gateway_reference: String,
    pub remote_status: String,
}

/// Gateway-side transaction state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub remote_status: String,
    pub amount: Decimal,
    pub currency: String,
    pub gateway_reference: String,
}

/// Failure talking to the payment gateway.
///
/// Always safe to retry; never implies anything about the remote
/// transaction state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway unreachable: {0}")]
    Transport(String),

    #[error("gateway returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("gateway rejected request: {0}")]
    Rejected(String),

    #[error("unreadable gateway response: {0}")]
    Decode(String),
}

/// Map the gateway's status vocabulary onto local payment statuses.
///
/// Total: anything unrecognized is `Pending`, never `Completed`.
pub fn normalize_status(remote_status: &str) -> PaymentStatus {
    match remote_status.trim().to_ascii_lowercase().as_str() {
        "success" => PaymentStatus::Completed,
        "pending" => PaymentStatus::Pending,
        "failed" => PaymentStatus::Failed,
        "cancelled" => PaymentStatus::Cancelled,
        _ => PaymentStatus::Pending,
    }
}
