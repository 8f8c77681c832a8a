// HTTP surface: routes, status codes, error bodies, callback and webhook.

#[path = "../helpers/mod.rs"]
mod helpers;

use actix_web::{test, web, App};
use helpers::{TestDataFactory, TestHarness};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use staypay::middleware::{RequestId, REQUEST_ID_HEADER};
use staypay::modules::gateways::compute_signature;
use staypay::modules::payments::controllers::{ReverifyAck, WebhookSecret};
use staypay::modules::payments::models::{Payment, PaymentMethod, PaymentStatus};

const WEBHOOK_SECRET: &str = "whsec_test";

macro_rules! init_app {
    ($harness:expr, $secret:expr) => {
        test::init_service(
            App::new()
                .wrap(RequestId)
                .app_data(web::Data::new($harness.service.clone()))
                .app_data(web::Data::new($harness.booking_repository()))
                .app_data(web::Data::new(WebhookSecret($secret)))
                .configure(staypay::configure),
        )
        .await
    };
}

async fn created_payment(harness: &TestHarness) -> Payment {
    let booking = TestDataFactory::booking(3, dec!(100.00));
    harness
        .service
        .create_for_booking(&booking, &TestDataFactory::payer(&booking))
        .await
        .unwrap()
}

#[actix_web::test]
async fn test_get_payment() {
    let harness = TestHarness::new();
    let payment = created_payment(&harness).await;
    let app = init_app!(harness, None);

    let req = test::TestRequest::get()
        .uri(&format!("/api/payments/{}", payment.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key(REQUEST_ID_HEADER));

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["reference"], payment.reference.as_str());
    assert_eq!(body["status"], "pending");
    assert_eq!(body["currency"], "ETB");
}

#[actix_web::test]
async fn test_unknown_payment_is_404_with_error_body() {
    let harness = TestHarness::new();
    let app = init_app!(harness, None);

    let req = test::TestRequest::get().uri("/api/payments/nope").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], 404);
}

#[actix_web::test]
async fn test_initiate_then_verify() {
    let harness = TestHarness::new();
    let payment = created_payment(&harness).await;
    let app = init_app!(harness, None);

    let req = test::TestRequest::post()
        .uri(&format!("/api/payments/{}/initiate", payment.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "processing");
    assert!(body["checkout_url"].as_str().unwrap().contains(&payment.reference));

    // Initiating twice is an invalid transition
    let req = test::TestRequest::post()
        .uri(&format!("/api/payments/{}/initiate", payment.id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 409);

    harness.gateway.answer_verify("success");
    let req = test::TestRequest::post()
        .uri(&format!("/api/payments/{}/verify", payment.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["previous_status"], "processing");
    assert_eq!(body["changed"], true);
}

#[actix_web::test]
async fn test_verify_before_initiate_is_409() {
    let harness = TestHarness::new();
    let payment = created_payment(&harness).await;
    let app = init_app!(harness, None);

    let req = test::TestRequest::post()
        .uri(&format!("/api/payments/{}/verify", payment.id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 409);
}

#[actix_web::test]
async fn test_gateway_failure_is_502_and_reset_recovers() {
    let harness = TestHarness::new();
    let payment = created_payment(&harness).await;
    harness
        .gateway
        .fail_next_initialize(staypay::modules::gateways::GatewayError::Timeout);
    let app = init_app!(harness, None);

    let req = test::TestRequest::post()
        .uri(&format!("/api/payments/{}/initiate", payment.id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 502);

    let req = test::TestRequest::post()
        .uri(&format!("/api/payments/{}/reset", payment.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Payment = test::read_body_json(resp).await;
    assert_eq!(body.status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn test_list_booking_payments() {
    let harness = TestHarness::new();
    let payment = created_payment(&harness).await;
    let app = init_app!(harness, None);

    let req = test::TestRequest::get()
        .uri(&format!("/api/bookings/{}/payments", payment.booking_id))
        .to_request();
    let body: Vec<Payment> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.len(), 1);
    assert_eq!(body[0].id, payment.id);

    let req = test::TestRequest::get()
        .uri("/api/bookings/not-a-number/payments")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn test_callback_only_schedules_reverify() {
    let harness = TestHarness::new();
    let payment = created_payment(&harness).await;
    harness.service.initiate(&payment.id).await.unwrap();
    harness.queue.clear();
    let app = init_app!(harness, None);

    let req = test::TestRequest::get()
        .uri(&format!("/api/payments/callback?trx_ref={}&status=success", payment.reference))
        .to_request();
    let ack: ReverifyAck = test::call_and_read_body_json(&app, req).await;

    assert!(ack.queued);
    assert_eq!(ack.reference, payment.reference);
    assert_eq!(harness.queue.count("reverify_payment"), 1);
    // The claimed status was not applied
    assert_eq!(
        harness.service.get_payment(&payment.id).await.unwrap().status,
        PaymentStatus::Processing
    );

    let req = test::TestRequest::get().uri("/api/payments/callback").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn test_webhook_with_valid_signature() {
    let harness = TestHarness::new();
    let payment = created_payment(&harness).await;
    harness.service.initiate(&payment.id).await.unwrap();
    harness.queue.clear();
    let app = init_app!(harness, Some(WEBHOOK_SECRET.to_string()));

    let body = json!({"event": "charge.success", "tx_ref": payment.reference, "status": "success"})
        .to_string();
    let signature = compute_signature(WEBHOOK_SECRET, body.as_bytes());

    let req = test::TestRequest::post()
        .uri("/api/webhooks/chapa")
        .insert_header(("x-chapa-signature", signature))
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    assert_eq!(harness.queue.count("reverify_payment"), 1);
    assert_eq!(
        harness.service.get_payment(&payment.id).await.unwrap().status,
        PaymentStatus::Processing
    );
}

#[actix_web::test]
async fn test_webhook_rejects_bad_or_missing_signature() {
    let harness = TestHarness::new();
    let payment = created_payment(&harness).await;
    let app = init_app!(harness, Some(WEBHOOK_SECRET.to_string()));
    let body = json!({"tx_ref": payment.reference, "status": "success"}).to_string();

    let req = test::TestRequest::post()
        .uri("/api/webhooks/chapa")
        .insert_header(("chapa-signature", compute_signature("wrong", body.as_bytes())))
        .set_payload(body.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::post()
        .uri("/api/webhooks/chapa")
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    assert!(harness.queue.count("reverify_payment") == 0);
}

#[actix_web::test]
async fn test_webhook_without_configured_secret_is_refused() {
    let harness = TestHarness::new();
    let payment = created_payment(&harness).await;
    let app = init_app!(harness, None);
    let body = json!({"tx_ref": payment.reference}).to_string();

    let req = test::TestRequest::post()
        .uri("/api/webhooks/chapa")
        .insert_header(("x-chapa-signature", compute_signature("anything", body.as_bytes())))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
async fn test_webhook_without_reference_is_400() {
    let harness = TestHarness::new();
    let app = init_app!(harness, Some(WEBHOOK_SECRET.to_string()));
    let body = json!({"event": "charge.success"}).to_string();

    let req = test::TestRequest::post()
        .uri("/api/webhooks/chapa")
        .insert_header(("x-chapa-signature", compute_signature(WEBHOOK_SECRET, body.as_bytes())))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn test_health() {
    let harness = TestHarness::new();
    let app = init_app!(harness, None);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn test_create_payment_for_booking() {
    let harness = TestHarness::new();
    let booking = TestDataFactory::booking(3, dec!(100.00));
    harness.bookings.insert(booking.clone()).await;
    let app = init_app!(harness, None);

    let req = test::TestRequest::post()
        .uri(&format!("/api/bookings/{}/payments", booking.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let created: Payment = test::read_body_json(resp).await;
    assert_eq!(created.booking_id, booking.id);
    assert_eq!(created.status, PaymentStatus::Pending);
    assert_eq!(created.amount, dec!(300.00));
    assert_eq!(created.customer_email, booking.guest.email);
    assert_eq!(created.customer_name, "Selam Tesfaye");

    let stored = harness.service.list_for_booking(booking.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, created.id);
    assert_eq!(harness.queue.count("notify_booking_confirmed"), 1);

    // A second active payment for the same booking is refused
    let req = test::TestRequest::post()
        .uri(&format!("/api/bookings/{}/payments", booking.id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 409);
    assert_eq!(harness.service.list_for_booking(booking.id).await.unwrap().len(), 1);
}

#[actix_web::test]
async fn test_create_payment_for_unknown_or_empty_booking() {
    let harness = TestHarness::new();
    let empty_stay = TestDataFactory::booking(0, dec!(100.00));
    harness.bookings.insert(empty_stay.clone()).await;
    let app = init_app!(harness, None);

    let req = test::TestRequest::post()
        .uri("/api/bookings/987654321/payments")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::post()
        .uri(&format!("/api/bookings/{}/payments", empty_stay.id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 422);
    assert!(harness.payments.is_empty().await);
}

#[actix_web::test]
async fn test_initiate_stores_checkout_details() {
    let harness = TestHarness::new();
    let payment = created_payment(&harness).await;
    let app = init_app!(harness, None);

    let req = test::TestRequest::post()
        .uri(&format!("/api/payments/{}/initiate", payment.id))
        .set_json(json!({"payment_method": "mobile_money", "customer_phone": "0911223344"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let stored = harness.service.get_payment(&payment.id).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Processing);
    assert_eq!(stored.payment_method, Some(PaymentMethod::MobileMoney));
    assert_eq!(stored.customer_phone.as_deref(), Some("0911223344"));

    let requests = harness.gateway.initialize_requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].phone_number.as_deref(), Some("0911223344"));
}

#[actix_web::test]
async fn test_initiate_rejects_malformed_details() {
    let harness = TestHarness::new();
    let payment = created_payment(&harness).await;
    let app = init_app!(harness, None);

    let req = test::TestRequest::post()
        .uri(&format!("/api/payments/{}/initiate", payment.id))
        .set_json(json!({"payment_method": "cash"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::post()
        .uri(&format!("/api/payments/{}/initiate", payment.id))
        .set_json(json!({"customer_phone": "0".repeat(30)}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    assert_eq!(harness.gateway.initialize_calls(), 0);
    assert_eq!(
        harness.service.get_payment(&payment.id).await.unwrap().status,
        PaymentStatus::Pending
    );
}
