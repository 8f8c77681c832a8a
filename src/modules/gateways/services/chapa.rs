use super::gateway_trait::{
    GatewayError, InitializeRequest, InitializeResponse, PaymentGateway, VerifyResponse,
};
use crate::config::ChapaConfig;
use crate::core::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;

/// Chapa payment gateway client
///
/// API Documentation: https://developer.chapa.co/
pub struct ChapaClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

impl ChapaClient {
    /// Create a new Chapa client
    ///
    /// # Arguments
    /// * `secret_key` - Chapa secret key (from CHAPA_SECRET_KEY env var)
    /// * `base_url` - Chapa API base URL (defaults to the v1 production API)
    /// * `timeout` - Upper bound for every request, connect included
    pub fn new(secret_key: String, base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = base_url
            .unwrap_or_else(|| "https://api.chapa.co/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        let parsed = Url::parse(&base_url)
            .map_err(|e| AppError::Configuration(format!("Invalid CHAPA_BASE_URL '{}': {}", base_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(AppError::Configuration(format!(
                "Invalid CHAPA_BASE_URL '{}': not a base URL",
                base_url
            )));
        }

        Ok(Self {
            client,
            secret_key,
            base_url,
        })
    }

    pub fn from_config(config: &ChapaConfig) -> Result<Self> {
        Self::new(
            config.secret_key.clone(),
            Some(config.base_url.clone()),
            config.timeout(),
        )
    }

    /// API URL under the base, each segment percent-encoded on its own
    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, GatewayError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GatewayError::Transport(format!("Invalid Chapa base URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| GatewayError::Transport("Chapa base URL cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    /// Send a request and unwrap Chapa's `{status, message, data}` envelope
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> std::result::Result<T, GatewayError> {
        let response = request
            .bearer_auth(&self.secret_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status_code = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Transport(format!("Failed to read Chapa response: {}", e))
            }
        })?;

        if !status_code.is_success() {
            return Err(GatewayError::Status {
                code: status_code.as_u16(),
                body,
            });
        }

        let envelope: ChapaEnvelope<T> = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Decode(format!("Failed to parse Chapa response: {}", e)))?;

        if !envelope.status.eq_ignore_ascii_case("success") {
            return Err(GatewayError::Rejected(message_text(&envelope.message)));
        }

        envelope
            .data
            .ok_or_else(|| GatewayError::Decode("Chapa response carried no data".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for ChapaClient {
    async fn initialize(
        &self,
        request: InitializeRequest,
    ) -> std::result::Result<InitializeResponse, GatewayError> {
        let url = self.endpoint(&["transaction", "initialize"])?;

        let mut payload = json!({
            "amount": request.currency.wire_amount(request.amount),
            "currency": request.currency.to_string(),
            "email": request.email,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "tx_ref": request.tx_ref,
            "callback_url": request.callback_url,
            "return_url": request.return_url,
            "customization": {
                "title": request.title,
                "description": request.description,
            }
        });
        if let Some(phone) = &request.phone_number {
            payload["phone_number"] = json!(phone);
        }

        let data: InitializeData = self.send(self.client.post(url).json(&payload)).await?;

        tracing::debug!(
            tx_ref = %request.tx_ref,
            checkout_url = %data.checkout_url,
            "Chapa checkout initialized"
        );

        Ok(InitializeResponse {
            checkout_url: data.checkout_url,
            // Chapa verifies by tx_ref; it only sometimes echoes its own id
            gateway_reference: data.reference.unwrap_or(request.tx_ref),
            remote_status: "success".to_string(),
        })
    }

    async fn verify(&self, gateway_reference: &str) -> std::result::Result<VerifyResponse, GatewayError> {
        let url = self.endpoint(&["transaction", "verify", gateway_reference])?;

        let data: VerifyData = self.send(self.client.get(url)).await?;

        Ok(VerifyResponse {
            remote_status: data.status,
            amount: data.amount,
            currency: data.currency,
            gateway_reference: data
                .reference
                .or(data.tx_ref)
                .unwrap_or_else(|| gateway_reference.to_string()),
        })
    }

    fn name(&self) -> &str {
        "chapa"
    }
}

fn message_text(message: &Value) -> String {
    match message {
        Value::String(text) => text.clone(),
        Value::Null => "no message".to_string(),
        // Validation failures arrive as {"field": ["reason"]}
        other => other.to_string(),
    }
}

// Chapa sends amounts as numbers on some endpoints and strings on others
fn decimal_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let text = match &raw {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected amount as string or number, got {}",
                other
            )))
        }
    };

    Decimal::from_str(text.trim())
        .or_else(|_| Decimal::from_scientific(text.trim()))
        .map_err(serde::de::Error::custom)
}

// Chapa API response structures

#[derive(Debug, Deserialize)]
struct ChapaEnvelope<T> {
    status: String,
    #[serde(default)]
    message: Value,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    checkout_url: String,
    #[serde(default)]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    #[serde(deserialize_with = "decimal_from_string_or_number")]
    amount: Decimal,
    currency: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    tx_ref: Option<String>,
}
