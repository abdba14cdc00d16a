//! Infrastructure layer for pipewright.
//!
//! Contains implementations of the ports defined in `pipewright-core`:
//! the reqwest step transport, the webhook notifier, and the in-memory and
//! Upstash selection-state stores. Also loads the engine configuration file.

pub mod config;
pub mod http;
pub mod notify;
pub mod selection;
