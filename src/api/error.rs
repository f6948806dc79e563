use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::converter::ConvertError;
use crate::services::staging::StagingError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    DependencyMissing(String),

    #[error("Failed to save file: {0}")]
    Io(#[from] StagingError),

    #[error("{program} failed: {stderr}")]
    ConversionFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Error processing file: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::DependencyMissing(_) => "dependency_missing",
            AppError::Io(_) => "io_error",
            AppError::ConversionFailed { .. } => "conversion_failed",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::DependencyMissing(_)
            | AppError::Io(_)
            | AppError::ConversionFailed { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ConvertError> for AppError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::NotInstalled { .. } => AppError::DependencyMissing(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::InvalidInput(msg) | AppError::PayloadTooLarge(msg) => {
                tracing::debug!("Rejected upload: {}", msg)
            }
            AppError::ConversionFailed { exit_code, .. } => {
                tracing::error!("Conversion failed (exit code {:?}): {}", exit_code, self)
            }
            _ => tracing::error!("{}", self),
        }

        let body = Json(json!({
            "error": self.kind(),
            "detail": self.to_string(),
        }));

        (status, body).into_response()
    }
}
