//! Workflow domain types for pipewright.
//!
//! Defines the wire shape of a workflow invocation (`WorkflowSpec` with its
//! `STEPS_CONFIG` / `PIPELINE_SETTINGS` blocks), the per-step descriptor,
//! selection-dependency tokens, and the `ExecutionResult` returned by a run.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::DefaultSettings;

// ---------------------------------------------------------------------------
// Workflow payload
// ---------------------------------------------------------------------------

/// A complete workflow invocation: steps, seed values and execution settings.
///
/// Supplied wholesale at run start and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    /// Execution id. Generated by the engine when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    /// Workspace namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Optional human-readable workflow name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    /// Original input, exposed to templates as `original_input`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_input: Option<Value>,
    /// Named input blocks (`input_1`, `input_2`, ...), exposed to templates by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_data: BTreeMap<String, Value>,
    /// Ordered step definitions forming the workflow DAG.
    #[serde(rename = "STEPS_CONFIG")]
    pub steps: Vec<StepDescriptor>,
    /// Execution settings.
    #[serde(rename = "PIPELINE_SETTINGS", default)]
    pub settings: PipelineSettings,
}

fn default_namespace() -> String {
    "default".to_string()
}

// ---------------------------------------------------------------------------
// Step descriptor
// ---------------------------------------------------------------------------

/// Immutable definition of one workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDescriptor {
    /// Human-readable step name.
    pub step_name: String,
    /// Unique step id (8 characters).
    pub usid: String,
    /// Target URL of the step's HTTP call.
    pub service_url: String,
    /// HTTP method.
    #[serde(default)]
    pub method: HttpMethod,
    /// Request headers, sent verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Declared output names, in order.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Dependency names: plain output names or selection tokens.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Request body / query template.
    #[serde(default)]
    pub input_prep_config: InputPrepConfig,
    /// Informational service classification (e.g. `DIRECT`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    /// Informational per-step namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Informational description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StepDescriptor {
    /// Dependencies that must exist in the output store before dispatch.
    pub fn data_dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .map(String::as_str)
            .filter(|d| !is_selection_dependency(d))
    }

    /// Dependencies that gate execution through an externally stored selection list.
    pub fn selection_dependencies(&self) -> impl Iterator<Item = SelectionToken> + '_ {
        self.dependencies.iter().filter_map(|d| SelectionToken::parse(d))
    }
}

/// How the request payload is prepared from the step's template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputPrepConfig {
    /// Payload encoding. Only `json` is produced.
    #[serde(rename = "type", default = "default_input_type")]
    pub input_type: String,
    /// Template tree; strings may embed `{{path}}` expressions.
    #[serde(default = "empty_object")]
    pub mapping: Value,
}

impl Default for InputPrepConfig {
    fn default() -> Self {
        Self {
            input_type: default_input_type(),
            mapping: empty_object(),
        }
    }
}

fn default_input_type() -> String {
    "json".to_string()
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// HTTP method of a step call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Parse a method name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HttpMethod::parse(&value).ok_or_else(|| format!("Unsupported HTTP method: {value}"))
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Selection tokens
// ---------------------------------------------------------------------------

/// A conditional dependency: `selection_` followed by 8 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionToken(String);

impl SelectionToken {
    pub const PREFIX: &'static str = "selection_";
    pub const LEN: usize = 18;

    /// Parse a dependency name; `None` for plain data-dependency names.
    pub fn parse(dep: &str) -> Option<Self> {
        let id = dep.strip_prefix(Self::PREFIX)?;
        let valid = dep.len() == Self::LEN
            && id
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then(|| SelectionToken(dep.to_string()))
    }

    /// The full token, as declared in the step's dependencies.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 8-character selection id after the prefix.
    pub fn selection_id(&self) -> &str {
        &self.0[Self::PREFIX.len()..]
    }
}

impl fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a dependency name is a selection token.
pub fn is_selection_dependency(dep: &str) -> bool {
    SelectionToken::parse(dep).is_some()
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// `PIPELINE_SETTINGS` block as supplied on the wire. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub error_handling: ErrorHandlingSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorHandlingSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Delay between attempts, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<u64>,
    /// Accepted for compatibility; a failing step always halts the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raise_on_error: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_timeout: Option<u64>,
    /// Accepted for compatibility; `step_timeout` bounds each attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pipeline_timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSettings {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub step_timeout: Duration,
    pub total_timeout: Duration,
    pub webhook_url: Option<String>,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        ExecutionSettings::from(&DefaultSettings::default())
    }
}

impl From<&DefaultSettings> for ExecutionSettings {
    fn from(defaults: &DefaultSettings) -> Self {
        Self {
            max_retries: defaults.max_retries,
            retry_delay: Duration::from_secs(defaults.retry_delay_secs),
            step_timeout: Duration::from_secs(defaults.step_timeout_secs),
            total_timeout: Duration::from_secs(defaults.total_pipeline_timeout_secs),
            webhook_url: None,
        }
    }
}

impl PipelineSettings {
    /// Fill absent fields from the engine defaults.
    pub fn resolve(&self, defaults: &DefaultSettings) -> ExecutionSettings {
        let eh = &self.error_handling;
        let to = &self.timeouts;
        ExecutionSettings {
            max_retries: eh.max_retries.unwrap_or(defaults.max_retries),
            retry_delay: Duration::from_secs(eh.retry_delay.unwrap_or(defaults.retry_delay_secs)),
            step_timeout: Duration::from_secs(
                to.step_timeout.unwrap_or(defaults.step_timeout_secs),
            ),
            total_timeout: Duration::from_secs(
                to.total_pipeline_timeout
                    .unwrap_or(defaults.total_pipeline_timeout_secs),
            ),
            webhook_url: self
                .notifications
                .webhook_url
                .clone()
                .filter(|u| !u.trim().is_empty()),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution result
// ---------------------------------------------------------------------------

/// Where a step ended up once the run finished or halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Aborted,
    NotReached,
}

/// Outcome of one workflow run. Always produced, success or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub workflow_id: String,
    pub namespace: String,
    /// Elapsed wall time in seconds.
    #[serde(rename = "execution_time")]
    pub execution_time_secs: f64,
    /// Scheduler order (empty when the graph was rejected).
    pub execution_order: Vec<String>,
    pub steps_completed: usize,
    pub steps_failed: usize,
    pub steps_aborted: usize,
    pub completed_steps: Vec<String>,
    pub failed_steps: Vec<String>,
    pub aborted_steps: Vec<String>,
    /// `final_result` output, else `result`, else the whole output store.
    pub final_result: Value,
    /// Full output store on success, partial on failure.
    pub outputs: Map<String, Value>,
    /// Bounded halting error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Status of a step within this run.
    pub fn status_of(&self, usid: &str) -> StepStatus {
        let has = |list: &[String]| list.iter().any(|u| u == usid);
        if has(&self.completed_steps) {
            StepStatus::Completed
        } else if has(&self.failed_steps) {
            StepStatus::Failed
        } else if has(&self.aborted_steps) {
            StepStatus::Aborted
        } else {
            StepStatus::NotReached
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
