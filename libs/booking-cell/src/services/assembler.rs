//! Pure mapping from stored rows to response shapes. Nothing here touches
//! the store.

use crate::models::{
    ConsultantFeedback, ConsultantFeedbackResponse, ConsultantScheduleEntry, ConsultationBooking,
    ConsultationBookingResponse, Invoice, UserRecord,
};

/// Missing accounts render as an empty name.
pub fn display_name(user: Option<&UserRecord>) -> String {
    user.and_then(|u| u.full_name.clone()).unwrap_or_default()
}

/// Amount billed so far; zero until an invoice exists.
pub fn invoice_amount(invoice: Option<&Invoice>) -> f64 {
    invoice.map(|i| i.total_amount).unwrap_or(0.0)
}

pub fn invoice_payment_method(invoice: Option<&Invoice>) -> Option<String> {
    invoice.and_then(|i| i.payment_method.clone())
}

pub fn consultation_response(
    booking: &ConsultationBooking,
    customer: Option<&UserRecord>,
    consultant: Option<&UserRecord>,
    invoice: Option<&Invoice>,
) -> ConsultationBookingResponse {
    ConsultationBookingResponse {
        booking_id: booking.id,
        customer_id: booking.customer_id,
        customer_name: display_name(customer),
        consultant_id: booking.consultant_id,
        consultant_name: display_name(consultant),
        booking_date: booking.booking_date,
        status: booking.status,
        amount: invoice_amount(invoice),
        payment_status: booking.payment_status,
        payment_method: invoice_payment_method(invoice),
        meet_link: booking.meet_link.clone(),
        note: booking.note.clone(),
        created_at: booking.created_at,
        updated_at: booking.updated_at,
    }
}

pub fn schedule_entry(
    booking: &ConsultationBooking,
    customer: Option<&UserRecord>,
) -> ConsultantScheduleEntry {
    ConsultantScheduleEntry {
        booking_id: booking.id,
        customer_id: booking.customer_id,
        customer_name: display_name(customer),
        customer_phone: customer.and_then(|c| c.phone.clone()),
        customer_email: customer.and_then(|c| c.email.clone()),
        booking_date: booking.booking_date,
        status: booking.status,
        payment_status: booking.payment_status,
        meet_link: booking.meet_link.clone(),
        note: booking.note.clone(),
    }
}

pub fn feedback_response(
    feedback: &ConsultantFeedback,
    customer: Option<&UserRecord>,
) -> ConsultantFeedbackResponse {
    ConsultantFeedbackResponse {
        feedback_id: feedback.id,
        booking_id: feedback.booking_id,
        consultant_id: feedback.consultant_id,
        customer_id: feedback.customer_id,
        customer_name: display_name(customer),
        rating: feedback.rating,
        comment: feedback.comment.clone(),
        created_at: feedback.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{BookingKind, BookingStatus, PaymentStatus};

    fn booking() -> ConsultationBooking {
        let now = Utc::now();
        ConsultationBooking {
            id: 11,
            customer_id: 1,
            consultant_id: 2,
            booking_date: now,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: Some("VNPAY".to_string()),
            note: None,
            meet_link: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_missing_invoice_means_zero_and_no_method() {
        let response = consultation_response(&booking(), None, None, None);
        assert_eq!(response.amount, 0.0);
        assert_eq!(response.payment_method, None);
        assert_eq!(response.customer_name, "");
        assert_eq!(response.consultant_name, "");
    }

    #[test]
    fn test_invoice_supplies_amount_and_method() {
        let invoice = Invoice {
            id: 1,
            booking_id: 11,
            booking_kind: BookingKind::Consultation,
            total_amount: 250000.0,
            payment_method: Some("CASH".to_string()),
            paid_at: None,
        };
        let consultant = UserRecord {
            id: 2,
            full_name: Some("Dr. Hoa".to_string()),
            email: None,
            phone: None,
            image_url: None,
            role: Some("CONSULTANT".to_string()),
        };

        let response = consultation_response(&booking(), None, Some(&consultant), Some(&invoice));
        assert_eq!(response.amount, 250000.0);
        assert_eq!(response.payment_method.as_deref(), Some("CASH"));
        assert_eq!(response.consultant_name, "Dr. Hoa");
    }
}
