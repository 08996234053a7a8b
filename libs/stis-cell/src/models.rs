use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use booking_cell::models::{BookingError, BookingStatus, PaymentStatus};
use shared_models::error::AppError;

// ==============================================================================
// TABLES
// ==============================================================================

pub const STIS_SERVICES: &str = "stis_services";
pub const STIS_BOOKINGS: &str = "stis_bookings";
pub const STIS_RESULTS: &str = "stis_results";
pub const STIS_FEEDBACK: &str = "stis_feedback";

/// Payment method that is settled at the clinic and never expires unpaid.
pub const CASH_PAYMENT: &str = "CASH";

// ==============================================================================
// SERVICE CATALOGUE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Active,
    Inactive,
}

impl FromStr for ServiceStatus {
    type Err = StisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(ServiceStatus::Active),
            "INACTIVE" => Ok(ServiceStatus::Inactive),
            other => Err(StisError::Validation(format!("Unknown service status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StisService {
    pub id: i64,
    pub service_name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration: Option<String>,
    pub tests: Option<String>,
    #[serde(rename = "type")]
    pub service_type: Option<String>,
    pub max_bookings_per_slot: i32,
    pub discount: i32,
    pub status: ServiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewStisService {
    pub service_name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration: Option<String>,
    pub tests: Option<String>,
    #[serde(rename = "type")]
    pub service_type: Option<String>,
    pub max_bookings_per_slot: i32,
    pub discount: i32,
    pub status: ServiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StisServiceRequest {
    pub service_name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration: Option<String>,
    pub tests: Option<String>,
    #[serde(rename = "type")]
    pub service_type: Option<String>,
    pub max_bookings_per_slot: Option<i32>,
    pub discount: Option<i32>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StisServiceResponse {
    pub service_id: i64,
    pub service_name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration: Option<String>,
    pub tests: Option<String>,
    #[serde(rename = "type")]
    pub service_type: Option<String>,
    pub max_bookings_per_slot: i32,
    pub discount: i32,
    pub status: ServiceStatus,
}

impl From<StisService> for StisServiceResponse {
    fn from(service: StisService) -> Self {
        Self {
            service_id: service.id,
            service_name: service.service_name,
            description: service.description,
            price: service.price,
            duration: service.duration,
            tests: service.tests,
            service_type: service.service_type,
            max_bookings_per_slot: service.max_bookings_per_slot,
            discount: service.discount,
            status: service.status,
        }
    }
}

// ==============================================================================
// BOOKINGS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StisBooking {
    pub id: i64,
    pub customer_id: i64,
    pub service_id: i64,
    pub booking_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewStisBooking {
    pub customer_id: i64,
    pub service_id: i64,
    pub booking_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStisBookingRequest {
    pub service_id: i64,
    pub booking_date: DateTime<Utc>,
    pub payment_method: Option<String>,
    pub note: Option<String>,
}

/// Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStisBookingRequest {
    pub booking_date: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StisSearchParams {
    pub name: Option<String>,
    pub service_id: Option<i64>,
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StisHistoryParams {
    pub service_id: Option<i64>,
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckLimitParams {
    pub service_id: i64,
    pub booking_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub service_id: i64,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
    pub booked: u64,
    pub max_bookings_per_slot: i32,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StisBookingResponse {
    pub booking_id: i64,
    pub customer_id: i64,
    pub customer_name: String,
    pub service_id: i64,
    pub service_name: String,
    pub service_price: f64,
    pub discount: i32,
    pub booking_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub result_status: Option<ResultStatus>,
    pub resulted_at: Option<DateTime<Utc>>,
    pub invoice_id: Option<i64>,
    pub amount: f64,
    pub payment_status: PaymentStatus,
    /// Method recorded on the invoice.
    pub payment_method: Option<String>,
    /// Method the customer chose when booking.
    pub preferred_payment_method: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// RESULTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Normal,
    Abnormal,
    Inconclusive,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultStatus::Normal => "NORMAL",
            ResultStatus::Abnormal => "ABNORMAL",
            ResultStatus::Inconclusive => "INCONCLUSIVE",
        };
        f.write_str(name)
    }
}

impl FromStr for ResultStatus {
    type Err = StisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Ok(ResultStatus::Normal),
            "ABNORMAL" => Ok(ResultStatus::Abnormal),
            "INCONCLUSIVE" => Ok(ResultStatus::Inconclusive),
            other => Err(StisError::Validation(format!("Unknown result status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StisResult {
    pub id: i64,
    pub booking_id: i64,
    pub result_text: String,
    pub result_status: ResultStatus,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewStisResult {
    pub booking_id: i64,
    pub result_text: String,
    pub result_status: ResultStatus,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `pdfBase64` carries the report file; it must decode to a PDF document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnResultRequest {
    pub result_text: String,
    pub result_status: ResultStatus,
    pub pdf_base64: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultListParams {
    pub result_status: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StisResultResponse {
    pub result_id: i64,
    pub booking_id: i64,
    pub result_text: String,
    pub result_status: ResultStatus,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StisResult> for StisResultResponse {
    fn from(result: StisResult) -> Self {
        Self {
            result_id: result.id,
            booking_id: result.booking_id,
            result_text: result.result_text,
            result_status: result.result_status,
            pdf_url: result.pdf_url,
            created_at: result.created_at,
            updated_at: result.updated_at,
        }
    }
}

// ==============================================================================
// FEEDBACK
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackStatus {
    Active,
    Hidden,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StisFeedback {
    pub id: i64,
    pub booking_id: i64,
    pub service_id: i64,
    pub user_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewStisFeedback {
    pub booking_id: i64,
    pub service_id: i64,
    pub user_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StisFeedbackRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StisFeedbackResponse {
    pub feedback_id: i64,
    pub booking_id: i64,
    pub service_id: i64,
    pub user_id: i64,
    pub customer_name: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingCount {
    pub rating: i32,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StisRatingSummary {
    pub service_id: i64,
    pub average_rating: f64,
    pub total_feedback: u64,
    /// One entry per star value, highest first.
    pub rating_counts: Vec<RatingCount>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum StisError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("STIS service not found")]
    ServiceNotFound,

    #[error("STIS service {0} is not available for booking")]
    ServiceInactive(i64),

    #[error("This time slot is fully booked ({0} bookings per hour)")]
    SlotFull(i32),

    #[error("No result recorded for this booking")]
    ResultNotFound,

    #[error("Results can only be returned for bookings awaiting or past testing, not {0}")]
    ResultNotExpected(BookingStatus),

    #[error("Invalid PDF attachment: {0}")]
    InvalidPdf(String),

    #[error("File upload failed: {0}")]
    Upload(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Duplicate(String),
}

impl From<anyhow::Error> for StisError {
    fn from(e: anyhow::Error) -> Self {
        StisError::Booking(BookingError::Store(e))
    }
}

impl From<StisError> for AppError {
    fn from(e: StisError) -> Self {
        let message = e.to_string();
        match e {
            StisError::Booking(inner) => inner.into(),
            StisError::ServiceNotFound | StisError::ResultNotFound => AppError::NotFound(message),
            StisError::ServiceInactive(_) => AppError::Validation {
                code: "SERVICE_INACTIVE",
                message,
            },
            StisError::SlotFull(_) => AppError::Conflict { code: "SLOT_FULL", message },
            StisError::ResultNotExpected(_) => AppError::Conflict {
                code: "INVALID_TRANSITION",
                message,
            },
            StisError::InvalidPdf(_) => AppError::Validation { code: "INVALID_PDF", message },
            StisError::Upload(detail) => AppError::ExternalService(detail),
            StisError::Validation(_) => AppError::validation(message),
            StisError::Duplicate(_) => AppError::conflict(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_service_row_uses_type_column() {
        let row = serde_json::json!({
            "id": 3,
            "service_name": "HIV rapid test",
            "description": null,
            "price": 150000.0,
            "duration": "30 minutes",
            "tests": "HIV-1/2",
            "type": "SINGLE",
            "max_bookings_per_slot": 4,
            "discount": 0,
            "status": "ACTIVE",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        });

        let service: StisService = serde_json::from_value(row).unwrap();
        assert_eq!(service.service_type.as_deref(), Some("SINGLE"));
        assert_eq!(service.status, ServiceStatus::Active);
    }

    #[test]
    fn test_error_mapping() {
        let full: AppError = StisError::SlotFull(2).into();
        assert_eq!(full.status(), StatusCode::CONFLICT);
        assert_eq!(full.error_code(), "SLOT_FULL");

        let upload: AppError = StisError::Upload("bucket missing".into()).into();
        assert_eq!(upload.status(), StatusCode::BAD_GATEWAY);

        let timing: AppError = StisError::Booking(BookingError::InvalidTiming).into();
        assert_eq!(timing.error_code(), "INVALID_TIMING");
    }
}
