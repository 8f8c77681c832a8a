/// Payment references must be unique across every payment ever created

use proptest::prelude::*;
use rust_decimal::Decimal;
use staypay::core::Currency;
use staypay::modules::bookings::Payer;
use staypay::modules::payments::models::Payment;
use std::collections::HashSet;

fn payer() -> Payer {
    Payer {
        email: "guest@example.com".to_string(),
        first_name: "Hana".to_string(),
        last_name: "Girma".to_string(),
        username: "hana".to_string(),
        phone: None,
    }
}

#[test]
fn test_ten_thousand_references_are_distinct() {
    let payer = payer();
    let mut references = HashSet::new();
    let mut ids = HashSet::new();

    for booking_id in 0..10_000 {
        let payment = Payment::new(booking_id, Decimal::new(10_000, 2), Currency::ETB, &payer).unwrap();
        assert!(references.insert(payment.reference.clone()));
        assert!(ids.insert(payment.id));
    }

    assert_eq!(references.len(), 10_000);
}

proptest! {
    /// Property: references are well-formed UUIDs and never equal the id
    #[test]
    fn test_reference_shape(booking_id in 1i64..1_000_000, cents in 1i64..100_000_000) {
        let payment = Payment::new(booking_id, Decimal::new(cents, 2), Currency::USD, &payer()).unwrap();

        prop_assert!(uuid::Uuid::parse_str(&payment.reference).is_ok());
        prop_assert_ne!(&payment.reference, &payment.id);
        prop_assert!(payment.reference.len() <= 100);
    }
}
