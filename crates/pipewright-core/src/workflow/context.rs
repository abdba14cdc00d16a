//! Per-run execution state: the output store and step status sets.
//!
//! A fresh `RunContext` is created for every run and threaded through the
//! executor. Nothing in here outlives the run it belongs to.

use std::collections::{BTreeMap, HashSet};

use pipewright_types::workflow::StepStatus;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// OutputStore
// ---------------------------------------------------------------------------

/// Growing map of every value produced during a run.
///
/// Seeded with `original_input` and the named input blocks; each completed
/// step merges its outputs in. Keys are never removed. A later step may
/// overwrite an existing name.
#[derive(Debug, Clone, Default)]
pub struct OutputStore {
    values: Map<String, Value>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the run's initial values. A null original input is skipped.
    pub fn seeded(original_input: Option<&Value>, input_data: &BTreeMap<String, Value>) -> Self {
        let mut store = Self::new();
        if let Some(input) = original_input.filter(|v| !v.is_null()) {
            store.insert("original_input", input.clone());
        }
        for (name, value) in input_data {
            store.insert(name, value.clone());
        }
        store
    }

    pub fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Names from `required` that are not present, in the order given.
    pub fn missing<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        required
            .into_iter()
            .filter(|name| !self.contains(name))
            .map(str::to_string)
            .collect()
    }

    /// Variable-resolution context for templates.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Final-result selection: `final_result`, else `result`, else the whole store.
    pub fn final_result(&self) -> Value {
        self.values
            .get("final_result")
            .or_else(|| self.values.get("result"))
            .cloned()
            .unwrap_or_else(|| Value::Object(self.values.clone()))
    }
}

// ---------------------------------------------------------------------------
// ExecutionState
// ---------------------------------------------------------------------------

/// Disjoint completed / failed / aborted sets over step usids.
///
/// Insertion order is kept alongside the sets so results list steps in the
/// order they were reached.
#[derive(Debug, Clone, Default)]
pub struct ExecutionState {
    seen: HashSet<String>,
    completed: Vec<String>,
    failed: Vec<String>,
    aborted: Vec<String>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal status for a step. Returns `false` if the step
    /// already had one (the first status sticks).
    pub fn mark(&mut self, usid: &str, status: StepStatus) -> bool {
        let list = match status {
            StepStatus::Completed => &mut self.completed,
            StepStatus::Failed => &mut self.failed,
            StepStatus::Aborted => &mut self.aborted,
            StepStatus::NotReached => return false,
        };
        if !self.seen.insert(usid.to_string()) {
            return false;
        }
        list.push(usid.to_string());
        true
    }

    pub fn status(&self, usid: &str) -> StepStatus {
        if self.completed.iter().any(|u| u == usid) {
            StepStatus::Completed
        } else if self.failed.iter().any(|u| u == usid) {
            StepStatus::Failed
        } else if self.aborted.iter().any(|u| u == usid) {
            StepStatus::Aborted
        } else {
            StepStatus::NotReached
        }
    }

    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn aborted(&self) -> &[String] {
        &self.aborted
    }
}

// ---------------------------------------------------------------------------
// RunContext
// ---------------------------------------------------------------------------

/// Everything a single run mutates, plus its identity.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub workflow_id: String,
    pub namespace: String,
    pub outputs: OutputStore,
    pub state: ExecutionState,
}

impl RunContext {
    pub fn new(workflow_id: impl Into<String>, namespace: impl Into<String>, outputs: OutputStore) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            namespace: namespace.into(),
            outputs,
            state: ExecutionState::new(),
        }
    }

    /// Key under which an output is mirrored to the selection-state store.
    pub fn store_key(&self, output_name: &str) -> String {
        output_key(&self.workflow_id, output_name)
    }
}

/// Selection-state store key for one output of one run: `<workflow_id>:output:<name>`.
pub fn output_key(workflow_id: &str, output_name: &str) -> String {
    format!("{workflow_id}:output:{output_name}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
