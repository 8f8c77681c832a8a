// Verification semantics: terminal states are final, repeated verifies are
// idempotent, and only the winning status update enqueues a notification.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{TestDataFactory, TestHarness};
use rust_decimal_macros::dec;
use staypay::core::AppError;
use staypay::modules::gateways::GatewayError;
use staypay::modules::payments::models::{Payment, PaymentStatus};

async fn initiated_payment(harness: &TestHarness) -> Payment {
    let booking = TestDataFactory::booking(3, dec!(100.00));
    harness.bookings.insert(booking.clone()).await;
    let payment = harness
        .service
        .create_for_booking(&booking, &TestDataFactory::payer(&booking))
        .await
        .unwrap();
    harness.service.initiate(&payment.id).await.unwrap();
    harness.queue.clear();
    payment
}

#[tokio::test]
async fn test_verify_before_initiate_is_missing_reference() {
    let harness = TestHarness::new();
    let booking = TestDataFactory::booking(1, dec!(20.00));
    let payment = harness
        .service
        .create_for_booking(&booking, &TestDataFactory::payer(&booking))
        .await
        .unwrap();

    let err = harness.service.verify(&payment.id).await.unwrap_err();
    assert!(matches!(err, AppError::MissingReference(_)));
    assert_eq!(harness.gateway.verify_calls(), 0);
}

#[tokio::test]
async fn test_terminal_states_never_change() {
    for (settle_with, terminal) in [
        ("success", PaymentStatus::Completed),
        ("failed", PaymentStatus::Failed),
        ("cancelled", PaymentStatus::Cancelled),
    ] {
        let harness = TestHarness::new();
        let payment = initiated_payment(&harness).await;

        harness.gateway.answer_verify(settle_with);
        assert_eq!(harness.service.verify(&payment.id).await.unwrap().status, terminal);

        for later in ["success", "failed", "cancelled", "pending", "weird_status"] {
            harness.gateway.answer_verify(later);
            let outcome = harness.service.verify(&payment.id).await.unwrap();

            assert_eq!(outcome.status, terminal, "{} then {}", settle_with, later);
            assert!(!outcome.changed);
            assert_eq!(outcome.remote_status, later);
        }

        let stored = harness.service.get_payment(&payment.id).await.unwrap();
        assert_eq!(stored.status, terminal);
    }
}

#[tokio::test]
async fn test_repeat_verify_enqueues_one_notification() {
    let harness = TestHarness::new();
    let payment = initiated_payment(&harness).await;
    harness.gateway.answer_verify("success");

    let first = harness.service.verify(&payment.id).await.unwrap();
    let second = harness.service.verify(&payment.id).await.unwrap();

    assert_eq!(first.status, PaymentStatus::Completed);
    assert_eq!(second.status, PaymentStatus::Completed);
    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(second.previous_status, PaymentStatus::Completed);
    assert_eq!(harness.queue.count("notify_payment_completed"), 1);
    assert_eq!(harness.gateway.verify_calls(), 2);
}

#[tokio::test]
async fn test_concurrent_verifies_apply_once() {
    let harness = TestHarness::new();
    let payment = initiated_payment(&harness).await;
    harness.gateway.answer_verify("success");

    let (a, b, c) = tokio::join!(
        harness.service.verify(&payment.id),
        harness.service.verify(&payment.id),
        harness.service.verify(&payment.id),
    );
    let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];

    assert!(outcomes.iter().all(|o| o.status == PaymentStatus::Completed));
    assert_eq!(outcomes.iter().filter(|o| o.changed).count(), 1);
    assert_eq!(harness.queue.count("notify_payment_completed"), 1);
}

#[tokio::test]
async fn test_remote_failure_enqueues_failed_notice() {
    let harness = TestHarness::new();
    let payment = initiated_payment(&harness).await;
    harness.gateway.answer_verify("FAILED");

    let outcome = harness.service.verify(&payment.id).await.unwrap();

    assert_eq!(outcome.status, PaymentStatus::Failed);
    assert_eq!(harness.queue.count("notify_payment_failed"), 1);
    assert_eq!(harness.queue.count("notify_payment_completed"), 0);
}

#[tokio::test]
async fn test_remote_cancellation_sends_nothing() {
    let harness = TestHarness::new();
    let payment = initiated_payment(&harness).await;
    harness.gateway.answer_verify("cancelled");

    let outcome = harness.service.verify(&payment.id).await.unwrap();

    assert_eq!(outcome.status, PaymentStatus::Cancelled);
    assert!(outcome.changed);
    assert!(harness.queue.tasks().is_empty());
}

#[tokio::test]
async fn test_pending_or_unknown_remote_leaves_processing() {
    let harness = TestHarness::new();
    let payment = initiated_payment(&harness).await;

    for remote in ["pending", "weird_status", ""] {
        harness.gateway.answer_verify(remote);
        let outcome = harness.service.verify(&payment.id).await.unwrap();

        assert_eq!(outcome.status, PaymentStatus::Processing);
        assert!(!outcome.changed);
    }
    assert!(harness.queue.tasks().is_empty());
}

#[tokio::test]
async fn test_gateway_error_leaves_status_unchanged() {
    let harness = TestHarness::new();
    let payment = initiated_payment(&harness).await;
    harness.gateway.fail_verify(GatewayError::Status {
        code: 503,
        body: "maintenance".to_string(),
    });

    let err = harness.service.verify(&payment.id).await.unwrap_err();

    assert!(matches!(err, AppError::Gateway(GatewayError::Status { code: 503, .. })));
    assert!(err.is_retryable());
    assert_eq!(
        harness.service.get_payment(&payment.id).await.unwrap().status,
        PaymentStatus::Processing
    );
}

#[tokio::test]
async fn test_amount_mismatch_still_completes() {
    let harness = TestHarness::new();
    let payment = initiated_payment(&harness).await;
    harness.gateway.answer_verify("success");
    harness.gateway.report_amount(dec!(1.00));

    let outcome = harness.service.verify(&payment.id).await.unwrap();

    assert_eq!(outcome.status, PaymentStatus::Completed);
    assert_eq!(outcome.amount, dec!(1.00));
}

#[tokio::test]
async fn test_request_reverify_skips_terminal_payments() {
    let harness = TestHarness::new();
    let payment = initiated_payment(&harness).await;

    let handle = harness.service.request_reverify(&payment.reference).await.unwrap();
    assert!(handle.is_some());
    assert_eq!(harness.queue.count("reverify_payment"), 1);

    harness.gateway.answer_verify("success");
    harness.service.verify(&payment.id).await.unwrap();
    harness.queue.clear();

    let handle = harness.service.request_reverify(&payment.reference).await.unwrap();
    assert!(handle.is_none());
    assert!(harness.queue.tasks().is_empty());

    let err = harness.service.request_reverify("no-such-ref").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_completion_records_gateway_transaction_id() {
    let harness = TestHarness::new();
    let payment = initiated_payment(&harness).await;

    harness.gateway.answer_verify("success");
    harness.gateway.report_reference("APchapa-77");
    harness.service.verify(&payment.id).await.unwrap();

    harness.gateway.report_reference("APchapa-other");
    harness.service.verify(&payment.id).await.unwrap();

    let stored = harness.service.get_payment(&payment.id).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Completed);
    assert_eq!(stored.transaction_id.as_deref(), Some("APchapa-77"));
}

#[tokio::test]
async fn test_failed_payment_has_no_transaction_id() {
    let harness = TestHarness::new();
    let payment = initiated_payment(&harness).await;

    harness.gateway.answer_verify("failed");
    harness.gateway.report_reference("APchapa-78");
    harness.service.verify(&payment.id).await.unwrap();

    let stored = harness.service.get_payment(&payment.id).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);
    assert!(stored.transaction_id.is_none());
}
