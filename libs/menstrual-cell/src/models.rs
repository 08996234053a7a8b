use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

pub const MENSTRUAL_CYCLES: &str = "menstrual_cycles";

pub const MIN_CYCLE_LENGTH: i32 = 20;
pub const MAX_CYCLE_LENGTH: i32 = 45;

/// Days from ovulation back from the next period start.
pub const LUTEAL_PHASE_DAYS: i64 = 14;

/// Number of upcoming cycles the calendar predicts.
pub const PREDICTED_CYCLES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenstrualCycle {
    pub id: i64,
    pub customer_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cycle_length: i32,
    pub note: Option<String>,
    pub last_notification_date: Option<NaiveDate>,
    pub last_notification_type: Option<ReminderKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MenstrualCycle {
    /// Bleeding days, both ends included.
    pub fn period_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

#[derive(Debug, Serialize)]
pub struct NewMenstrualCycle {
    pub customer_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cycle_length: i32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderKind {
    PeriodUpcoming,
    FertileWindow,
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderKind::PeriodUpcoming => write!(f, "PERIOD_UPCOMING"),
            ReminderKind::FertileWindow => write!(f, "FERTILE_WINDOW"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cycle_length: i32,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleResponse {
    pub cycle_id: i64,
    pub customer_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cycle_length: i32,
    pub period_days: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&MenstrualCycle> for CycleResponse {
    fn from(cycle: &MenstrualCycle) -> Self {
        Self {
            cycle_id: cycle.id,
            customer_id: cycle.customer_id,
            start_date: cycle.start_date,
            end_date: cycle.end_date,
            cycle_length: cycle.cycle_length,
            period_days: cycle.period_days(),
            note: cycle.note.clone(),
            created_at: cycle.created_at,
            updated_at: cycle.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictedCycle {
    pub cycle_number: usize,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub ovulation_date: NaiveDate,
    pub fertile_start: NaiveDate,
    pub fertile_end: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenstrualCalendarResponse {
    pub cycle_id: i64,
    pub last_period_start: NaiveDate,
    pub cycle_length: i32,
    pub period_days: i64,
    pub cycles: Vec<PredictedCycle>,
}

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Menstrual cycle not found")]
    NotFound,

    #[error("No menstrual cycle recorded yet")]
    NoCycles,

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<CycleError> for AppError {
    fn from(e: CycleError) -> Self {
        let message = e.to_string();
        match e {
            CycleError::NotFound | CycleError::NoCycles => AppError::NotFound(message),
            CycleError::Validation(_) => AppError::validation(message),
            CycleError::Store(err) => AppError::Database(format!("{:#}", err)),
        }
    }
}
