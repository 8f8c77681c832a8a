//! Plain-text bodies for guest notifications

use crate::modules::bookings::models::Booking;
use crate::modules::notifications::services::notifier::EmailMessage;
use crate::modules::payments::models::Payment;

const DATE_FORMAT: &str = "%B %-d, %Y";

pub fn payment_completed(payment: &Payment, booking: &Booking) -> EmailMessage {
    let body = format!(
        "Hello {name},\n\n\
         We received your payment of {amount} for {title}.\n\n\
         Booking: {booking_ref}\n\
         Stay: {start} to {end}\n\
         Payment reference: {reference}\n\n\
         Thank you for booking with us.\n",
        name = payment.customer_name,
        amount = payment.currency.format_amount(payment.amount),
        title = booking.listing.title,
        booking_ref = booking.display_reference(),
        start = booking.start_date.format(DATE_FORMAT),
        end = booking.end_date.format(DATE_FORMAT),
        reference = payment.reference,
    );

    EmailMessage {
        to: payment.customer_email.clone(),
        subject: format!("Payment Confirmation - {}", booking.listing.title),
        body,
    }
}

pub fn payment_failed(payment: &Payment, booking: &Booking) -> EmailMessage {
    let body = format!(
        "Hello {name},\n\n\
         Your payment of {amount} for {title} could not be completed.\n\n\
         Booking: {booking_ref}\n\
         Payment reference: {reference}\n\n\
         No money was taken. You can try again from your booking page.\n",
        name = payment.customer_name,
        amount = payment.currency.format_amount(payment.amount),
        title = booking.listing.title,
        booking_ref = booking.display_reference(),
        reference = payment.reference,
    );

    EmailMessage {
        to: payment.customer_email.clone(),
        subject: format!("Payment Failed - {}", booking.listing.title),
        body,
    }
}

/// Sent when the booking is created. `payment` is the pending charge, if any.
pub fn booking_confirmed(booking: &Booking, payment: Option<&Payment>) -> EmailMessage {
    let guest_name = format!("{} {}", booking.guest.first_name, booking.guest.last_name);
    let guest_name = match guest_name.trim() {
        "" => booking.guest.username.as_str(),
        name => name,
    };

    let mut body = format!(
        "Hello {name},\n\n\
         Your booking {booking_ref} for {title} is confirmed.\n\
         Stay: {start} to {end} ({nights} nights)\n",
        name = guest_name,
        booking_ref = booking.display_reference(),
        title = booking.listing.title,
        start = booking.start_date.format(DATE_FORMAT),
        end = booking.end_date.format(DATE_FORMAT),
        nights = booking.nights(),
    );

    if let Some(payment) = payment {
        body.push_str(&format!(
            "Amount due: {}\nPayment reference: {}\n",
            payment.currency.format_amount(payment.amount),
            payment.reference
        ));
    }

    body.push_str("\nWe look forward to hosting you.\n");

    EmailMessage {
        to: booking.guest.email.clone(),
        subject: format!("Booking Confirmation - {}", booking.listing.title),
        body,
    }
}
