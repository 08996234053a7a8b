use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

pub const QUESTIONS: &str = "questions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionStatus {
    Pending,
    Answered,
    Deleted,
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionStatus::Pending => write!(f, "PENDING"),
            QuestionStatus::Answered => write!(f, "ANSWERED"),
            QuestionStatus::Deleted => write!(f, "DELETED"),
        }
    }
}

impl FromStr for QuestionStatus {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(QuestionStatus::Pending),
            "ANSWERED" => Ok(QuestionStatus::Answered),
            "DELETED" => Ok(QuestionStatus::Deleted),
            other => Err(QuestionError::Validation(format!(
                "Unknown question status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub customer_id: i64,
    /// Consultant the customer addressed, if any.
    pub consultant_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub answer: Option<String>,
    pub answered_by: Option<i64>,
    pub status: QuestionStatus,
    pub created_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct NewQuestion {
    pub customer_id: i64,
    pub consultant_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub status: QuestionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskQuestionRequest {
    pub title: String,
    pub content: String,
    pub consultant_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub answer: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionListParams {
    pub status: Option<String>,
    pub consultant_id: Option<i64>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub question_id: i64,
    pub customer_id: i64,
    pub customer_name: String,
    pub consultant_id: Option<i64>,
    pub consultant_name: Option<String>,
    pub title: String,
    pub content: String,
    pub answer: Option<String>,
    pub answered_by: Option<i64>,
    pub answered_by_name: Option<String>,
    pub status: QuestionStatus,
    pub created_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
}

#[derive(Error, Debug)]
pub enum QuestionError {
    #[error("Question not found")]
    NotFound,

    #[error("Consultant {0} not found")]
    ConsultantNotFound(i64),

    #[error("Question has already been answered")]
    AlreadyAnswered,

    #[error("Question has been deleted")]
    Deleted,

    #[error("{0}")]
    Validation(String),

    #[error("Question was changed by another request")]
    ConcurrentModification,

    #[error("Storage error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<QuestionError> for AppError {
    fn from(e: QuestionError) -> Self {
        let message = e.to_string();
        match e {
            QuestionError::NotFound | QuestionError::ConsultantNotFound(_) => {
                AppError::NotFound(message)
            }
            QuestionError::AlreadyAnswered
            | QuestionError::Deleted
            | QuestionError::ConcurrentModification => AppError::conflict(message),
            QuestionError::Validation(_) => AppError::validation(message),
            QuestionError::Store(err) => AppError::Database(format!("{:#}", err)),
        }
    }
}
