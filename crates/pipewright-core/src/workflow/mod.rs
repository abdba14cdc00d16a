//! Workflow engine core: payload validation, DAG ordering, and execution.
//!
//! - `definition` -- payload validation, parsing, workflow id generation
//! - `dag` -- dependency graph and deterministic topological order
//! - `template` -- `{{path}}` resolution against the output store
//! - `context` -- per-run output store and step status sets
//! - `selection` -- selection-dependency gating
//! - `extract` -- response-shape extractors
//! - `retry` -- fixed-delay retry policy
//! - `dispatcher` -- single-step HTTP dispatch with retries
//! - `executor` -- sequential DAG executor

pub mod context;
pub mod dag;
pub mod definition;
pub mod dispatcher;
pub mod executor;
pub mod extract;
pub mod retry;
pub mod selection;
pub mod template;

pub use definition::WorkflowError;
pub use executor::{DagExecutor, RunError};
