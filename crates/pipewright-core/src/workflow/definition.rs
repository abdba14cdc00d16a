//! Workflow payload validation and parsing.
//!
//! Validation runs on the raw JSON before typed decoding so that every
//! structural problem is reported at once, not just the first serde error.

use std::collections::HashSet;

use pipewright_types::workflow::{HttpMethod, WorkflowSpec};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Configuration-level failures. Fatal: a run never starts (or halts before
/// any step is dispatched) when one of these occurs.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// JSON decode failure after structural validation passed.
    #[error("parse error: {0}")]
    ParseError(String),

    /// One or more structural problems in the payload.
    #[error("Payload validation failed:\n{}", .0.join("\n"))]
    ValidationError(Vec<String>),

    /// Dependency graph contains a cycle.
    #[error("Cycle detected in workflow dependencies: {0}")]
    CycleDetected(String),
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

const REQUIRED_STEP_FIELDS: [&str; 5] = ["step_name", "usid", "service_url", "method", "outputs"];

const USID_LEN: usize = 8;

/// Validate a raw payload, returning every problem found (empty when valid).
pub fn validate_payload(payload: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(steps) = payload.get("STEPS_CONFIG") else {
        errors.push("Missing STEPS_CONFIG".to_string());
        return errors;
    };

    let steps = match steps.as_array() {
        Some(steps) if !steps.is_empty() => steps,
        _ => {
            errors.push("STEPS_CONFIG must be a non-empty array".to_string());
            return errors;
        }
    };

    let mut usids_seen = HashSet::new();
    for (i, step) in steps.iter().enumerate() {
        let name = step
            .get("step_name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        for problem in validate_step(step) {
            errors.push(format!("Step {i} ({name}): {problem}"));
        }

        if let Some(usid) = step.get("usid").and_then(Value::as_str) {
            if !usids_seen.insert(usid) {
                errors.push(format!("Duplicate USID: {usid}"));
            }
        }
    }

    errors
}

fn validate_step(step: &Value) -> Vec<String> {
    let Some(fields) = step.as_object() else {
        return vec!["Step must be an object".to_string()];
    };

    let mut problems: Vec<String> = REQUIRED_STEP_FIELDS
        .iter()
        .filter(|f| !fields.contains_key(**f))
        .map(|f| format!("Missing required field: {f}"))
        .collect();

    let usid = fields.get("usid").and_then(Value::as_str).unwrap_or("");
    if usid.chars().count() != USID_LEN {
        problems.push(format!("USID must be {USID_LEN} characters, got: {usid}"));
    }

    let method = fields.get("method").and_then(Value::as_str).unwrap_or("");
    if HttpMethod::parse(method).is_none() {
        problems.push(format!("Invalid HTTP method: {}", method.to_ascii_uppercase()));
    }

    match fields.get("outputs").and_then(Value::as_array) {
        Some(outputs) if !outputs.is_empty() => {}
        _ => problems.push("Outputs must be a non-empty array".to_string()),
    }

    problems
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Validate then decode a raw payload into a `WorkflowSpec`.
pub fn parse_payload(payload: &Value) -> Result<WorkflowSpec, WorkflowError> {
    let errors = validate_payload(payload);
    if !errors.is_empty() {
        return Err(WorkflowError::ValidationError(errors));
    }
    serde_json::from_value(payload.clone()).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

/// Parse a JSON document into a `WorkflowSpec`.
pub fn parse_payload_str(json: &str) -> Result<WorkflowSpec, WorkflowError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| WorkflowError::ParseError(e.to_string()))?;
    parse_payload(&value)
}

// ---------------------------------------------------------------------------
// Workflow ids
// ---------------------------------------------------------------------------

/// Derive a workflow id: first 16 hex chars of SHA-256 over `namespace:name:timestamp`.
pub fn generate_workflow_id(namespace: &str, workflow_name: &str, unix_timestamp: i64) -> String {
    let digest = Sha256::digest(format!("{namespace}:{workflow_name}:{unix_timestamp}"));
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

/// The payload's workflow id, or a freshly generated one when absent.
pub fn resolve_workflow_id(spec: &WorkflowSpec) -> String {
    match spec.workflow_id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => generate_workflow_id(
            &spec.namespace,
            spec.workflow_name.as_deref().unwrap_or("workflow"),
            chrono::Utc::now().timestamp(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_step(usid: &str) -> Value {
        json!({
            "step_name": "echo",
            "usid": usid,
            "service_url": "http://localhost/echo",
            "method": "post",
            "outputs": ["out"]
        })
    }

    #[test]
    fn valid_payload_has_no_errors() {
        let payload = json!({"STEPS_CONFIG": [valid_step("a1b2c3d4"), valid_step("b1b2c3d4")]});
        assert!(validate_payload(&payload).is_empty());
    }

    #[test]
    fn missing_steps_config() {
        assert_eq!(validate_payload(&json!({})), vec!["Missing STEPS_CONFIG"]);
        assert_eq!(
            validate_payload(&json!({"STEPS_CONFIG": []})),
            vec!["STEPS_CONFIG must be a non-empty array"]
        );
    }

    #[test]
    fn collects_all_step_problems() {
        let payload = json!({"STEPS_CONFIG": [
            {"step_name": "bad", "usid": "abc", "method": "TRACE", "outputs": []}
        ]});
        let errors = validate_payload(&payload);
        assert_eq!(
            errors,
            vec![
                "Step 0 (bad): Missing required field: service_url",
                "Step 0 (bad): USID must be 8 characters, got: abc",
                "Step 0 (bad): Invalid HTTP method: TRACE",
                "Step 0 (bad): Outputs must be a non-empty array",
            ]
        );
    }

    #[test]
    fn duplicate_usids_reported() {
        let payload = json!({"STEPS_CONFIG": [valid_step("a1b2c3d4"), valid_step("a1b2c3d4")]});
        assert_eq!(validate_payload(&payload), vec!["Duplicate USID: a1b2c3d4"]);
    }

    #[test]
    fn parse_payload_rejects_invalid() {
        let err = parse_payload(&json!({})).unwrap_err();
        assert!(matches!(err, WorkflowError::ValidationError(ref e) if e.len() == 1));
        assert_eq!(err.to_string(), "Payload validation failed:\nMissing STEPS_CONFIG");
    }

    #[test]
    fn parse_payload_accepts_valid() {
        let spec = parse_payload(&json!({"STEPS_CONFIG": [valid_step("a1b2c3d4")]})).unwrap();
        assert_eq!(spec.steps[0].usid, "a1b2c3d4");
        assert_eq!(spec.namespace, "default");
    }

    #[test]
    fn workflow_id_generation_is_stable() {
        let a = generate_workflow_id("ns", "demo", 1_700_000_000);
        let b = generate_workflow_id("ns", "demo", 1_700_000_000);
        let c = generate_workflow_id("ns", "demo", 1_700_000_001);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn resolve_workflow_id_prefers_supplied() {
        let mut spec = parse_payload(&json!({"STEPS_CONFIG": [valid_step("a1b2c3d4")]})).unwrap();
        assert_eq!(resolve_workflow_id(&spec).len(), 16);
        spec.workflow_id = Some("wf-1".into());
        assert_eq!(resolve_workflow_id(&spec), "wf-1");
    }
}
