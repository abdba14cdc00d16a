//! In-process selection-state store.
//!
//! Entries live in a `DashMap` with a per-entry expiry instant. Expired
//! entries are evicted lazily on read, and every [`PURGE_EVERY`] writes the
//! whole map is swept so keys that are never read again do not pile up.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use pipewright_core::storage::SelectionStore;
use pipewright_types::error::StoreError;
use serde_json::Value;
use tokio::time::Instant;

/// Writes between full sweeps of expired entries.
pub const PURGE_EVERY: usize = 64;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Selection store held in process memory.
#[derive(Debug, Default)]
pub struct InMemorySelectionStore {
    entries: DashMap<String, Entry>,
    writes: AtomicUsize,
}

impl InMemorySelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including any not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

impl SelectionStore for InMemorySelectionStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now, entry.value.clone()));
        match hit {
            Some((true, value)) => Ok(Some(value)),
            Some((false, _)) => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % PURGE_EVERY == 0 {
            let before = self.entries.len();
            self.purge_expired();
            tracing::debug!(
                swept = before.saturating_sub(self.entries.len()),
                "swept expired selection entries"
            );
        }
        Ok(())
    }
}
