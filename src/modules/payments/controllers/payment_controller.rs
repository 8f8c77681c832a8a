use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Result};
use crate::modules::bookings::{BookingRepository, Payer};
use crate::modules::payments::models::CheckoutDetails;
use crate::modules::payments::services::PaymentService;
use crate::modules::tasks::models::TaskHandle;

/// Query the gateway appends when it calls back after checkout
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(alias = "tx_ref", alias = "reference")]
    pub trx_ref: Option<String>,
    /// Gateway's claimed outcome; logged, never applied
    pub status: Option<String>,
}

/// Acknowledgement for callback and webhook deliveries
#[derive(Debug, Serialize, Deserialize)]
pub struct ReverifyAck {
    pub reference: String,
    /// False when the payment was already settled
    pub queued: bool,
    pub task_id: Option<String>,
}

impl ReverifyAck {
    pub fn new(reference: String, handle: Option<TaskHandle>) -> Self {
        Self {
            reference,
            queued: handle.is_some(),
            task_id: handle.map(|h| h.id.to_string()),
        }
    }
}

/// GET /api/payments/{id}
pub async fn get_payment(
    service: web::Data<Arc<PaymentService>>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let payment = service.get_payment(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(payment))
}

/// POST /api/payments/{id}/initiate
///
/// Optional JSON body `{"payment_method": "...", "customer_phone": "..."}`;
/// an empty body starts checkout with what the payment already holds.
/// Returns the checkout URL the customer should be redirected to.
pub async fn initiate_payment(
    service: web::Data<Arc<PaymentService>>,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let details: CheckoutDetails = if body.iter().all(u8::is_ascii_whitespace) {
        CheckoutDetails::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let outcome = service.initiate_with(&path.into_inner(), details).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /api/payments/{id}/verify
pub async fn verify_payment(
    service: web::Data<Arc<PaymentService>>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let outcome = service.verify(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /api/payments/{id}/reset
pub async fn reset_payment(
    service: web::Data<Arc<PaymentService>>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let payment = service.reset_to_pending(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(payment))
}

/// POST /api/bookings/{booking_id}/payments
///
/// Creates the pending payment for a booking, priced from its stay, and
/// queues the booking confirmation email.
///
/// # Returns
/// * `201 Created` - The new payment
/// * `404 Not Found` - Unknown booking
/// * `409 Conflict` - Booking already has an active or completed payment
/// * `422 Unprocessable Entity` - Empty stay or non-positive price
pub async fn create_booking_payment(
    service: web::Data<Arc<PaymentService>>,
    bookings: web::Data<Arc<dyn BookingRepository>>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let booking_id = path.into_inner();
    let booking = bookings
        .find_by_id(booking_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Booking {} not found", booking_id)))?;

    let payer = Payer::from(&booking.guest);
    let payment = service.create_for_booking(&booking, &payer).await?;

    Ok(HttpResponse::Created().json(payment))
}

/// GET /api/bookings/{booking_id}/payments
pub async fn list_booking_payments(
    service: web::Data<Arc<PaymentService>>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let payments = service.list_for_booking(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(payments))
}

/// GET /api/payments/callback?trx_ref=...
///
/// Only schedules a re-verification; the status in the query is not trusted.
pub async fn payment_callback(
    service: web::Data<Arc<PaymentService>>,
    query: web::Query<CallbackQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let reference = query
        .trx_ref
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| AppError::validation("Missing trx_ref"))?;

    tracing::info!(
        reference = %reference,
        claimed_status = query.status.as_deref().unwrap_or("none"),
        "Gateway callback received"
    );

    let handle = service.request_reverify(&reference).await?;
    Ok(HttpResponse::Ok().json(ReverifyAck::new(reference, handle)))
}

/// Configure payment routes under `/api`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/payments/callback", web::get().to(payment_callback))
            .route("/payments/{id}", web::get().to(get_payment))
            .route("/payments/{id}/initiate", web::post().to(initiate_payment))
            .route("/payments/{id}/verify", web::post().to(verify_payment))
            .route("/payments/{id}/reset", web::post().to(reset_payment))
            .service(
                web::resource("/bookings/{booking_id}/payments")
                    .route(web::get().to(list_booking_payments))
                    .route(web::post().to(create_booking_payment)),
            )
            .route(
                "/webhooks/chapa",
                web::post().to(super::webhook_controller::chapa_webhook),
            ),
    );
}
