//! Selection-state store adapters.
//!
//! [`SelectionBackend`] picks one adapter at startup from the
//! `[selection_store]` configuration section.

pub mod memory;
pub mod upstash;

pub use memory::InMemorySelectionStore;
pub use upstash::UpstashSelectionStore;

use std::time::Duration;

use pipewright_core::storage::SelectionStore;
use pipewright_types::config::{SelectionStoreConfig, SelectionStoreKind};
use pipewright_types::error::StoreError;
use secrecy::SecretString;
use serde_json::Value;

/// The configured selection store.
#[derive(Debug)]
pub enum SelectionBackend {
    Memory(InMemorySelectionStore),
    Upstash(UpstashSelectionStore),
}

impl SelectionBackend {
    /// Build the backend named by `config`.
    ///
    /// An Upstash backend without both a REST URL and token, or with an
    /// unparseable URL, falls back to the in-memory store with a warning.
    pub fn from_config(config: &SelectionStoreConfig, client: reqwest::Client) -> Self {
        match config.backend {
            SelectionStoreKind::Memory => Self::Memory(InMemorySelectionStore::new()),
            SelectionStoreKind::Upstash => {
                let url = config.rest_url.as_deref().filter(|u| !u.trim().is_empty());
                let token = config.rest_token.as_deref().filter(|t| !t.trim().is_empty());
                let (Some(url), Some(token)) = (url, token) else {
                    tracing::warn!(
                        "Upstash selection store requested without rest_url and rest_token, using in-memory store"
                    );
                    return Self::Memory(InMemorySelectionStore::new());
                };
                match UpstashSelectionStore::new(client, url, SecretString::from(token.to_string())) {
                    Ok(store) => Self::Upstash(store),
                    Err(err) => {
                        tracing::warn!(error = %err, "Upstash selection store unavailable, using in-memory store");
                        Self::Memory(InMemorySelectionStore::new())
                    }
                }
            }
        }
    }

    pub fn kind(&self) -> SelectionStoreKind {
        match self {
            Self::Memory(_) => SelectionStoreKind::Memory,
            Self::Upstash(_) => SelectionStoreKind::Upstash,
        }
    }
}

impl SelectionStore for SelectionBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self {
            Self::Memory(store) => store.get(key).await,
            Self::Upstash(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.set(key, value, ttl).await,
            Self::Upstash(store) => store.set(key, value, ttl).await,
        }
    }
}
