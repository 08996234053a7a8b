use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

pub const CONSULTANT_PROFILES: &str = "consultant_profiles";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultantProfile {
    pub id: i64,
    pub consultant_id: i64,
    pub job_title: Option<String>,
    pub introduction: Option<String>,
    pub specialization: Option<String>,
    pub languages: Option<String>,
    pub experience_years: i32,
    pub hourly_rate: f64,
    pub location: Option<String>,
    pub details: Option<String>,
    pub is_available: bool,
    /// False once the manager has ended the consultant's employment.
    pub employment_status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct NewConsultantProfile {
    pub consultant_id: i64,
    pub job_title: Option<String>,
    pub introduction: Option<String>,
    pub specialization: Option<String>,
    pub languages: Option<String>,
    pub experience_years: i32,
    pub hourly_rate: f64,
    pub location: Option<String>,
    pub details: Option<String>,
    pub is_available: bool,
    pub employment_status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

/// Body for both creating and editing a profile; on edit, absent fields are
/// left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultantProfileRequest {
    pub job_title: Option<String>,
    pub introduction: Option<String>,
    pub specialization: Option<String>,
    pub languages: Option<String>,
    pub experience_years: Option<i32>,
    pub hourly_rate: Option<f64>,
    pub location: Option<String>,
    pub details: Option<String>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultantSearchParams {
    pub specialization: Option<String>,
    pub name: Option<String>,
    pub available_only: Option<bool>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmploymentStatusParams {
    pub employment_status: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyRateParams {
    pub hourly_rate: f64,
}

// ==============================================================================
// RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultantProfileResponse {
    pub profile_id: i64,
    pub consultant_id: i64,
    pub full_name: String,
    pub email: Option<String>,
    pub user_image_url: Option<String>,
    pub job_title: Option<String>,
    pub introduction: Option<String>,
    pub specialization: Option<String>,
    pub languages: Option<String>,
    pub experience_years: i32,
    pub hourly_rate: f64,
    pub location: Option<String>,
    pub details: Option<String>,
    pub is_available: bool,
    pub employment_status: bool,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ConsultantError {
    #[error("Consultant profile not found")]
    NotFound,

    #[error("Consultant {0} already has a profile")]
    AlreadyExists(i64),

    #[error("Account {0} is not a consultant")]
    NotAConsultant(i64),

    #[error("{0}")]
    Validation(String),

    #[error("Consultant profile was changed by another request")]
    ConcurrentModification,

    #[error("Storage error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<ConsultantError> for AppError {
    fn from(e: ConsultantError) -> Self {
        let message = e.to_string();
        match e {
            ConsultantError::NotFound | ConsultantError::NotAConsultant(_) => {
                AppError::NotFound(message)
            }
            ConsultantError::AlreadyExists(_) | ConsultantError::ConcurrentModification => {
                AppError::conflict(message)
            }
            ConsultantError::Validation(_) => AppError::validation(message),
            ConsultantError::Store(err) => AppError::Database(format!("{:#}", err)),
        }
    }
}
