//! Application error type mapping to HTTP status codes.
//!
//! Error bodies share the shape of a failed [`ExecutionResult`]:
//! `{"success": false, "error": "..."}`, plus `validation_errors` when the
//! payload was rejected before running.
//!
//! [`ExecutionResult`]: pipewright_types::workflow::ExecutionResult

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pipewright_core::workflow::WorkflowError;
use serde_json::json;

use crate::state::RunRejection;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Payload failed structural validation.
    Validation(Vec<String>),
    /// Request body was not usable.
    BadRequest(String),
    /// The run exceeded its total pipeline timeout.
    Timeout(String),
}

impl From<RunRejection> for AppError {
    fn from(e: RunRejection) -> Self {
        match e {
            RunRejection::Rejected(WorkflowError::ValidationError(problems)) => {
                AppError::Validation(problems)
            }
            RunRejection::Rejected(other) => AppError::BadRequest(other.to_string()),
            timed_out @ RunRejection::TimedOut(_) => AppError::Timeout(timed_out.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(problems) => {
                let error = WorkflowError::ValidationError(problems.clone()).to_string();
                (
                    StatusCode::BAD_REQUEST,
                    json!({"success": false, "error": error, "validation_errors": problems}),
                )
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, json!({"success": false, "error": msg}))
            }
            AppError::Timeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, json!({"success": false, "error": msg}))
            }
        };
        (status, Json(body)).into_response()
    }
}
