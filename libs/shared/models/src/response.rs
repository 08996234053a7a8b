use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Envelope every endpoint answers with: `{status, message, data, errorCode}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status: u16,
    pub message: String,
    pub data: Option<T>,
    pub error_code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            message: message.into(),
            data: Some(data),
            error_code: None,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED.as_u16(),
            message: message.into(),
            data: Some(data),
            error_code: None,
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>, error_code: &str) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            data: None,
            error_code: Some(error_code.to_string()),
        }
    }
}

impl ApiResponse<()> {
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            message: message.into(),
            data: None,
            error_code: None,
        }
    }
}
