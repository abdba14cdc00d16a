//! Selection-state store trait.
//!
//! Defines the interface for the external key-value store that carries
//! step outputs across the run, most notably the selection lists that gate
//! conditional steps. Keys are `<workflow_id>:output:<name>`.

use std::time::Duration;

use pipewright_types::error::StoreError;
use serde_json::Value;

/// Trait for run-scoped JSON key-value storage with expiry.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in pipewright-infra.
pub trait SelectionStore: Send + Sync {
    /// Get a value by key. Returns `None` on a miss or an expired entry.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Set a value for a key (upsert), expiring after `ttl`.
    fn set(
        &self,
        key: &str,
        value: &Value,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
