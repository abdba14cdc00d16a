//! Workflow execution endpoint.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use pipewright_types::workflow::ExecutionResult;
use serde_json::Value;

use crate::http::error::AppError;
use crate::state::AppState;

/// POST /execute - Run a workflow payload to completion.
///
/// Failed runs are still `200 OK` with `success: false`; only rejected
/// payloads (400) and pipeline timeouts (504) map to error statuses.
pub async fn execute(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ExecutionResult>, AppError> {
    let Json(payload) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let result = state.execute_payload(&payload).await?;
    Ok(Json(result))
}
