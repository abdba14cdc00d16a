//! Lifecycle event types for workflow runs.
//!
//! `WorkflowEvent` is emitted by the executor at every run and step
//! transition. Notifiers wrap it into a `NotificationPayload` for delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::text::{MAX_FINAL_RESULT_PREVIEW_LEN, MAX_OUTPUT_PREVIEW_LEN, format_timestamp, preview};

/// Where a step sits in the run: identity plus 1-based position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPosition {
    pub step_name: String,
    pub usid: String,
    /// 1-based index in the execution order.
    pub step_index: usize,
    pub total_steps: usize,
}

/// Events emitted during a workflow run.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// The run has begun; no step has been dispatched yet.
    WorkflowStarted {
        workflow_name: Option<String>,
        total_steps: usize,
    },

    /// A step passed gating and dependency checks and is being dispatched.
    StepStarted(StepPosition),

    /// A step returned its outputs.
    StepCompleted {
        step: StepPosition,
        outputs: Map<String, Value>,
        execution_time_secs: f64,
    },

    /// A step failed; the run halts.
    StepFailed { step: StepPosition, error: String },

    /// A step was skipped by a selection dependency.
    StepAborted { step: StepPosition, reason: String },

    WorkflowCompleted {
        final_result: Value,
        execution_time_secs: f64,
        steps_completed: usize,
        steps_failed: usize,
        steps_aborted: usize,
    },

    WorkflowFailed {
        error: String,
        execution_time_secs: f64,
        steps_completed: usize,
    },
}

impl WorkflowEvent {
    /// Wire name of the event.
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::WorkflowStarted { .. } => "workflow_started",
            WorkflowEvent::StepStarted(_) => "step_started",
            WorkflowEvent::StepCompleted { .. } => "step_completed",
            WorkflowEvent::StepFailed { .. } => "step_failed",
            WorkflowEvent::StepAborted { .. } => "step_aborted",
            WorkflowEvent::WorkflowCompleted { .. } => "workflow_completed",
            WorkflowEvent::WorkflowFailed { .. } => "workflow_failed",
        }
    }

    /// Event-specific `data` object of the notification payload.
    pub fn data(&self) -> Value {
        match self {
            WorkflowEvent::WorkflowStarted {
                workflow_name,
                total_steps,
            } => json!({
                "workflow_name": workflow_name,
                "total_steps": total_steps,
                "status": "running",
            }),
            WorkflowEvent::StepStarted(step) => step_data(step, "running"),
            WorkflowEvent::StepCompleted {
                step,
                outputs,
                execution_time_secs,
            } => {
                let previews: Map<String, Value> = outputs
                    .iter()
                    .map(|(name, value)| {
                        (name.clone(), Value::String(preview(value, MAX_OUTPUT_PREVIEW_LEN)))
                    })
                    .collect();
                let mut data = step_data(step, "completed");
                data["execution_time_seconds"] = json!(round_secs(*execution_time_secs));
                data["outputs"] = Value::Object(previews);
                data
            }
            WorkflowEvent::StepFailed { step, error } => {
                let mut data = step_data(step, "failed");
                data["error"] = json!(error);
                data
            }
            WorkflowEvent::StepAborted { step, reason } => {
                let mut data = step_data(step, "aborted");
                data["reason"] = json!(reason);
                data
            }
            WorkflowEvent::WorkflowCompleted {
                final_result,
                execution_time_secs,
                steps_completed,
                steps_failed,
                steps_aborted,
            } => json!({
                "status": "completed",
                "execution_time_seconds": round_secs(*execution_time_secs),
                "steps_completed": steps_completed,
                "steps_failed": steps_failed,
                "steps_aborted": steps_aborted,
                "final_result": preview(final_result, MAX_FINAL_RESULT_PREVIEW_LEN),
            }),
            WorkflowEvent::WorkflowFailed {
                error,
                execution_time_secs,
                steps_completed,
            } => json!({
                "status": "failed",
                "error": error,
                "execution_time_seconds": round_secs(*execution_time_secs),
                "steps_completed": steps_completed,
            }),
        }
    }
}

fn step_data(step: &StepPosition, status: &str) -> Value {
    json!({
        "step_name": step.step_name,
        "usid": step.usid,
        "step_index": step.step_index,
        "total_steps": step.total_steps,
        "status": status,
    })
}

fn round_secs(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

/// Envelope delivered to the notification sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub event: String,
    pub workflow_id: String,
    pub namespace: String,
    pub timestamp: String,
    pub data: Value,
}

impl NotificationPayload {
    pub fn new(
        event: &WorkflowEvent,
        workflow_id: &str,
        namespace: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            event: event.event_type().to_string(),
            workflow_id: workflow_id.to_string(),
            namespace: namespace.to_string(),
            timestamp: format_timestamp(at),
            data: event.data(),
        }
    }
}
