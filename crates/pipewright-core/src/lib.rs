//! Workflow execution engine and port definitions for pipewright.
//!
//! This crate defines the "ports" (the HTTP transport, the selection-state
//! store and the notification sink) that the infrastructure layer
//! implements, plus the engine that drives them. It depends only on
//! `pipewright-types` -- never on `pipewright-infra` or any network crate.

pub mod event;
pub mod storage;
pub mod transport;
pub mod workflow;
