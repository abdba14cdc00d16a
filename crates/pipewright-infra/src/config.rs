//! Engine configuration loader.
//!
//! Reads an optional TOML file into [`EngineConfig`] and layers the
//! `UPSTASH_REST_URL` / `UPSTASH_REST_TOKEN` environment overrides on top.
//! Falls back to defaults when the file is missing or malformed.

use std::path::Path;

use pipewright_types::config::{EngineConfig, SelectionStoreKind};

/// Environment variable holding the Upstash REST endpoint.
pub const UPSTASH_URL_ENV: &str = "UPSTASH_REST_URL";
/// Environment variable holding the Upstash REST token.
pub const UPSTASH_TOKEN_ENV: &str = "UPSTASH_REST_TOKEN";

/// Load engine configuration from `path`.
///
/// - If the file does not exist, returns [`EngineConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config.
pub async fn load_engine_config(path: &Path) -> EngineConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            EngineConfig::default()
        }
    }
}

/// Apply Upstash credentials from the environment.
///
/// Values present in the environment replace the file's. When both a URL
/// and a token end up set, the Upstash backend is selected.
pub fn apply_env_overrides(config: &mut EngineConfig) {
    apply_upstash_overrides(
        config,
        std::env::var(UPSTASH_URL_ENV).ok(),
        std::env::var(UPSTASH_TOKEN_ENV).ok(),
    );
}

fn apply_upstash_overrides(config: &mut EngineConfig, url: Option<String>, token: Option<String>) {
    let store = &mut config.selection_store;
    if let Some(url) = url.filter(|v| !v.trim().is_empty()) {
        store.rest_url = Some(url);
    }
    if let Some(token) = token.filter(|v| !v.trim().is_empty()) {
        store.rest_token = Some(token);
    }
    if store.rest_url.is_some() && store.rest_token.is_some() {
        store.backend = SelectionStoreKind::Upstash;
    }
}
