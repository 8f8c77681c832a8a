use crate::core::{AppError, Currency, Result};
use crate::modules::bookings::models::Payer;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment lifecycle status
///
/// `pending → processing → {completed | failed | cancelled}`, with
/// `pending → failed | cancelled` as shortcuts. The last three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Created, checkout not yet started
    #[default]
    Pending,

    /// Checkout session open at the gateway
    Processing,

    /// Gateway confirmed the payment
    Completed,

    /// Initiation failed, gateway reported failure, or the payment expired
    Failed,

    /// Cancelled at the gateway
    Cancelled,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    /// Still able to become `completed`
    pub fn is_active(self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }

    /// Whether the orchestrator may move a payment from `self` to `next`.
    ///
    /// `failed → pending` is deliberately absent; it only happens through an
    /// explicit reset.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;

        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

/// How the customer paid, when the gateway tells us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Bank,
    MobileMoney,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Bank => write!(f, "bank"),
            PaymentMethod::MobileMoney => write!(f, "mobile_money"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentMethod::Card),
            "bank" => Ok(PaymentMethod::Bank),
            "mobile_money" => Ok(PaymentMethod::MobileMoney),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }
}

/// Payment for a booking
///
/// Amount is fixed at creation. Customer fields are a snapshot of the payer
/// at that moment, so later profile edits never touch settled records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,

    /// Client-side transaction reference, unique, sent to the gateway as `tx_ref`
    pub reference: String,

    pub booking_id: i64,

    pub amount: Decimal,

    pub currency: Currency,

    pub status: PaymentStatus,

    /// Chosen by the customer when starting checkout
    pub payment_method: Option<PaymentMethod>,

    /// Gateway's own id for the settled charge, recorded on completion
    pub transaction_id: Option<String>,

    /// Gateway's key for this payment; set once by a successful initiation
    pub gateway_transaction_ref: Option<String>,

    pub checkout_url: Option<String>,

    pub customer_email: String,

    pub customer_name: String,

    pub customer_phone: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Start of the current pending period; the expiry sweep ages from here.
    /// Equal to `created_at` until a reset restarts it.
    pub pending_since: DateTime<Utc>,
}

/// Optional customer input when starting checkout
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CheckoutDetails {
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub customer_phone: Option<String>,
}

impl CheckoutDetails {
    pub const MAX_PHONE_LEN: usize = 20;

    /// Trim the phone and reject anything that would not fit the column
    pub fn normalized(self) -> Result<Self> {
        let customer_phone = self
            .customer_phone
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty());

        if let Some(phone) = &customer_phone {
            if phone.chars().count() > Self::MAX_PHONE_LEN {
                return Err(AppError::validation(format!(
                    "customer_phone must be at most {} characters",
                    Self::MAX_PHONE_LEN
                )));
            }
        }

        Ok(Self {
            payment_method: self.payment_method,
            customer_phone,
        })
    }
}

/// Everything a successful initiation writes, applied in one conditional update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initiation {
    pub gateway_reference: String,
    pub checkout_url: String,
    /// Left unchanged when `None`
    pub payment_method: Option<PaymentMethod>,
    /// Left unchanged when `None`
    pub customer_phone: Option<String>,
}

impl Payment {
    /// Create a new pending payment
    ///
    /// # Arguments
    /// * `booking_id` - Owning booking
    /// * `amount` - Total for the stay, already rounded to currency scale
    /// * `currency` - Charge currency
    /// * `payer` - Contact details to snapshot
    pub fn new(booking_id: i64, amount: Decimal, currency: Currency, payer: &Payer) -> Result<Self> {
        currency.validate_amount(amount).map_err(AppError::validation)?;

        if payer.email.trim().is_empty() {
            return Err(AppError::validation("Payer email cannot be empty"));
        }

        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            reference: Uuid::new_v4().to_string(),
            booking_id,
            amount,
            currency,
            status: PaymentStatus::Pending,
            payment_method: None,
            transaction_id: None,
            gateway_transaction_ref: None,
            checkout_url: None,
            customer_email: payer.email.trim().to_string(),
            customer_name: payer.display_name(),
            customer_phone: payer.phone.clone(),
            created_at: now,
            updated_at: now,
            pending_since: now,
        })
    }

    /// First word of the snapshotted name, for the gateway form
    pub fn customer_first_name(&self) -> &str {
        self.customer_name.split_whitespace().next().unwrap_or("")
    }

    /// Everything after the first word of the snapshotted name
    pub fn customer_last_name(&self) -> String {
        self.customer_name
            .split_whitespace()
            .skip(1)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl std::fmt::Display for Payment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Payment {} - {}", self.reference, self.status)
    }
}
