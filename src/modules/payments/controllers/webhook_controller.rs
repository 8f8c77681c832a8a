use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::Value;

use super::payment_controller::ReverifyAck;
use crate::core::{AppError, Result};
use crate::modules::gateways::verify_signature;
use crate::modules::payments::services::PaymentService;

/// Shared secret for Chapa webhook signatures
#[derive(Debug, Clone)]
pub struct WebhookSecret(pub Option<String>);

const SIGNATURE_HEADERS: [&str; 2] = ["x-chapa-signature", "chapa-signature"];

/// String field of the webhook body, logged for context only
fn claimed_field<'a>(payload: &'a Value, name: &str) -> Option<&'a str> {
    payload.get(name).and_then(Value::as_str)
}

/// POST /api/webhooks/chapa
///
/// The body must carry a valid HMAC-SHA256 signature in `x-chapa-signature`
/// or `chapa-signature`. A valid delivery only schedules a re-verification
/// of the payment named by `tx_ref`.
///
/// # Returns
/// * `200 OK` - Delivery accepted
/// * `400 Bad Request` - Body is not JSON or has no `tx_ref`
/// * `401 Unauthorized` - Missing or invalid signature, or no secret configured
/// * `404 Not Found` - Unknown payment reference
pub async fn chapa_webhook(
    req: HttpRequest,
    body: web::Bytes,
    secret: web::Data<WebhookSecret>,
    service: web::Data<Arc<PaymentService>>,
) -> Result<HttpResponse> {
    let Some(secret) = secret.0.as_deref() else {
        tracing::warn!("Webhook received but CHAPA_WEBHOOK_SECRET is not configured");
        return Err(AppError::unauthorized("Webhook verification is not configured"));
    };

    let signatures: Vec<&str> = SIGNATURE_HEADERS
        .iter()
        .filter_map(|name| req.headers().get(*name))
        .filter_map(|value| value.to_str().ok())
        .collect();

    if signatures.is_empty() {
        return Err(AppError::unauthorized("Missing webhook signature"));
    }

    if !signatures
        .iter()
        .any(|signature| verify_signature(secret, &body, signature))
    {
        tracing::warn!("Invalid webhook signature");
        return Err(AppError::unauthorized("Invalid webhook signature"));
    }

    let payload: Value = serde_json::from_slice(&body)?;
    let reference = payload
        .get("tx_ref")
        .or_else(|| payload.get("trx_ref"))
        .and_then(Value::as_str)
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| AppError::validation("Webhook payload has no tx_ref"))?
        .to_string();

    let event = claimed_field(&payload, "event").unwrap_or("unknown");
    let claimed_status = claimed_field(&payload, "status").unwrap_or("none");
    tracing::info!(
        reference = %reference,
        event,
        claimed_status,
        "Chapa webhook received"
    );

    let handle = service.request_reverify(&reference).await?;
    Ok(HttpResponse::Ok().json(ReverifyAck::new(reference, handle)))
}
