use booking_cell::models::{Invoice, UserRecord};
use booking_cell::services::assembler::{display_name, invoice_amount, invoice_payment_method};

use crate::models::{
    StisBooking, StisBookingResponse, StisFeedback, StisFeedbackResponse, StisResult, StisService,
};

/// A booking whose service row has gone missing still renders, with an
/// empty name and zero price.
pub fn stis_booking_response(
    booking: &StisBooking,
    customer: Option<&UserRecord>,
    service: Option<&StisService>,
    invoice: Option<&Invoice>,
    result: Option<&StisResult>,
) -> StisBookingResponse {
    StisBookingResponse {
        booking_id: booking.id,
        customer_id: booking.customer_id,
        customer_name: display_name(customer),
        service_id: booking.service_id,
        service_name: service.map(|s| s.service_name.clone()).unwrap_or_default(),
        service_price: service.map(|s| s.price).unwrap_or(0.0),
        discount: service.map(|s| s.discount).unwrap_or(0),
        booking_date: booking.booking_date,
        status: booking.status,
        result_status: result.map(|r| r.result_status),
        resulted_at: result.map(|r| r.created_at),
        invoice_id: invoice.map(|i| i.id),
        amount: invoice_amount(invoice),
        payment_status: booking.payment_status,
        payment_method: invoice_payment_method(invoice),
        preferred_payment_method: booking.payment_method.clone(),
        note: booking.note.clone(),
        created_at: booking.created_at,
        updated_at: booking.updated_at,
    }
}

pub fn stis_feedback_response(
    feedback: &StisFeedback,
    customer: Option<&UserRecord>,
) -> StisFeedbackResponse {
    StisFeedbackResponse {
        feedback_id: feedback.id,
        booking_id: feedback.booking_id,
        service_id: feedback.service_id,
        user_id: feedback.user_id,
        customer_name: display_name(customer),
        rating: feedback.rating,
        comment: feedback.comment.clone(),
        created_at: feedback.created_at,
    }
}
