//! Shared domain types for pipewright.
//!
//! This crate contains the types exchanged between the engine, its adapters
//! and the invocation surfaces: step descriptors, the workflow payload,
//! lifecycle events, the execution result and the engine configuration.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod text;
pub mod workflow;
