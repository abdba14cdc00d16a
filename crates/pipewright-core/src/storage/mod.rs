//! Storage abstractions for pipewright.
//!
//! Defines the selection-state store trait.
//! Implementations live in pipewright-infra.

pub mod selection_store;

pub use selection_store::SelectionStore;
