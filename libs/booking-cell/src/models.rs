use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

// ==============================================================================
// TABLES
// ==============================================================================

pub const CONSULTATION_BOOKINGS: &str = "consultation_bookings";
pub const CONSULTANT_FEEDBACK: &str = "consultant_feedback";
pub const INVOICES: &str = "invoices";
pub const USERS: &str = "users";

// ==============================================================================
// STATUS MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    PendingTestResult,
    Completed,
    Cancelled,
    NoShow,
    Denied,
    Deleted,
    FailedPayment,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 9] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::PendingTestResult,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
        BookingStatus::Denied,
        BookingStatus::Deleted,
        BookingStatus::FailedPayment,
    ];

    /// Statuses that give the slot back.
    pub const RELEASED: [BookingStatus; 4] = [
        BookingStatus::Cancelled,
        BookingStatus::Denied,
        BookingStatus::Deleted,
        BookingStatus::FailedPayment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::PendingTestResult => "PENDING_TEST_RESULT",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::NoShow => "NO_SHOW",
            BookingStatus::Denied => "DENIED",
            BookingStatus::Deleted => "DELETED",
            BookingStatus::FailedPayment => "FAILED_PAYMENT",
        }
    }

    pub fn holds_slot(&self) -> bool {
        !Self::RELEASED.contains(self)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| BookingError::Validation(format!("Unknown booking status '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingKind {
    Consultation,
    Stis,
}

/// Operations that move a booking between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Confirm,
    Cancel,
    Deny,
    FailPayment,
    AwaitResult,
    Complete,
    MarkNoShow,
    Delete,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Transition::Confirm => "confirm",
            Transition::Cancel => "cancel",
            Transition::Deny => "deny",
            Transition::FailPayment => "fail payment for",
            Transition::AwaitResult => "await test results for",
            Transition::Complete => "complete",
            Transition::MarkNoShow => "mark as no-show",
            Transition::Delete => "delete",
        };
        f.write_str(verb)
    }
}

// ==============================================================================
// RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationBooking {
    pub id: i64,
    pub customer_id: i64,
    pub consultant_id: i64,
    pub booking_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub note: Option<String>,
    pub meet_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewConsultationBooking {
    pub customer_id: i64,
    pub consultant_id: i64,
    pub booking_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub note: Option<String>,
    pub meet_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account row owned by the identity service; read for names and roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub image_url: Option<String>,
    pub role: Option<String>,
}

/// Written by the payment integration; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub booking_id: i64,
    pub booking_kind: BookingKind,
    pub total_amount: f64,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultantFeedback {
    pub id: i64,
    pub booking_id: i64,
    pub consultant_id: i64,
    pub customer_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewConsultantFeedback {
    pub booking_id: i64,
    pub consultant_id: i64,
    pub customer_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsultationRequest {
    pub consultant_id: i64,
    pub booking_date: DateTime<Utc>,
    pub note: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub booking_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingLinkRequest {
    pub meet_link: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationHistoryParams {
    pub consultant_id: Option<i64>,
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationSearchParams {
    pub name: Option<String>,
    pub consultant_id: Option<i64>,
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationBookingResponse {
    pub booking_id: i64,
    pub customer_id: i64,
    pub customer_name: String,
    pub consultant_id: i64,
    pub consultant_name: String,
    pub booking_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub amount: f64,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub meet_link: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Consultant's view of a booking, with customer contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultantScheduleEntry {
    pub booking_id: i64,
    pub customer_id: i64,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub booking_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub meet_link: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultantCalendarResponse {
    pub consultant_id: i64,
    pub booked_slots: Vec<DateTime<Utc>>,
    pub available_slots: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultantFeedbackResponse {
    pub feedback_id: i64,
    pub booking_id: i64,
    pub consultant_id: i64,
    pub customer_id: i64,
    pub customer_name: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultantRatingSummary {
    pub consultant_id: i64,
    pub average_rating: f64,
    pub total_feedback: u64,
    pub feedback: Vec<ConsultantFeedbackResponse>,
}

// ==============================================================================
// VALIDATION RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct BookingValidationRules {
    pub min_lead_minutes: i64,
    pub max_horizon_days: i64,
    pub conflict_buffer_minutes: i64,
    pub calendar_days: i64,
    pub calendar_first_hour: u32,
    pub calendar_last_hour: u32,
}

impl Default for BookingValidationRules {
    fn default() -> Self {
        Self {
            min_lead_minutes: 30,
            max_horizon_days: 30,
            conflict_buffer_minutes: 30,
            calendar_days: 2,
            calendar_first_hour: 8,
            calendar_last_hour: 17,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Booking not found")]
    NotFound,

    #[error("{0} not found")]
    MissingReference(&'static str),

    #[error("Booking time is in the past")]
    InvalidTiming,

    #[error("Bookings must be made at least {0} minutes in advance")]
    InsufficientLeadTime(i64),

    #[error("Bookings can only be made up to {0} days ahead")]
    OutOfHorizon(i64),

    #[error("Consultant already has a booking within {0} minutes of this time")]
    SlotConflict(i64),

    #[error("Cannot {transition} a booking in status {from}")]
    InvalidTransition { from: BookingStatus, transition: Transition },

    #[error("Booking was modified by another request")]
    ConcurrentModification,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Duplicate(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<serde_json::Error> for BookingError {
    fn from(e: serde_json::Error) -> Self {
        BookingError::Store(e.into())
    }
}

impl From<BookingError> for AppError {
    fn from(e: BookingError) -> Self {
        let message = e.to_string();
        match e {
            BookingError::NotFound | BookingError::MissingReference(_) => AppError::NotFound(message),
            BookingError::InvalidTiming => AppError::Validation { code: "INVALID_TIMING", message },
            BookingError::InsufficientLeadTime(_) => AppError::Validation {
                code: "INSUFFICIENT_LEAD_TIME",
                message,
            },
            BookingError::OutOfHorizon(_) => AppError::Validation { code: "OUT_OF_HORIZON", message },
            BookingError::Validation(_) => AppError::validation(message),
            BookingError::SlotConflict(_) => AppError::Conflict { code: "SLOT_CONFLICT", message },
            BookingError::InvalidTransition { .. } => AppError::Conflict {
                code: "INVALID_TRANSITION",
                message,
            },
            BookingError::ConcurrentModification => AppError::Conflict {
                code: "CONCURRENT_MODIFICATION",
                message,
            },
            BookingError::Duplicate(_) => AppError::conflict(message),
            BookingError::Store(err) => AppError::Database(format!("{:#}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!("pending_test_result".parse::<BookingStatus>().unwrap(), BookingStatus::PendingTestResult);
        assert!("archived".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_released_statuses_free_the_slot() {
        assert!(BookingStatus::Pending.holds_slot());
        assert!(BookingStatus::NoShow.holds_slot());
        assert!(!BookingStatus::Cancelled.holds_slot());
        assert!(!BookingStatus::FailedPayment.holds_slot());
    }

    #[test]
    fn test_error_codes_map_to_http() {
        let err: AppError = BookingError::SlotConflict(30).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "SLOT_CONFLICT");

        let err: AppError = BookingError::InvalidTransition {
            from: BookingStatus::Deleted,
            transition: Transition::Cancel,
        }
        .into();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        assert_eq!(err.to_string(), "Conflict: Cannot cancel a booking in status DELETED");
    }
}
