//! Engine configuration types.
//!
//! `EngineConfig` represents the optional `pipewright.toml` that controls the
//! HTTP listener, the selection-state store backend, outbound HTTP behaviour
//! and the execution defaults applied when a payload omits its settings.

use serde::{Deserialize, Serialize};

/// Top-level engine configuration. All sections have defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub selection_store: SelectionStoreConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub defaults: DefaultSettings,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which selection-state store adapter to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStoreKind {
    #[default]
    Memory,
    Upstash,
}

/// `[selection_store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionStoreConfig {
    #[serde(default)]
    pub backend: SelectionStoreKind,
    /// Upstash REST endpoint, e.g. `https://eu1-xxx.upstash.io`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_url: Option<String>,
    /// Upstash REST token. Prefer `UPSTASH_REST_TOKEN` over the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_token: Option<String>,
    /// Expiry of entries written after each step.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for SelectionStoreConfig {
    fn default() -> Self {
        Self {
            backend: SelectionStoreKind::default(),
            rest_url: None,
            rest_token: None,
            ttl_secs: default_ttl_secs(),
        }
    }
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_notification_timeout_secs")]
    pub notification_timeout_secs: u64,
}

fn default_user_agent() -> String {
    concat!("pipewright/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_notification_timeout_secs() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            notification_timeout_secs: default_notification_timeout_secs(),
        }
    }
}

/// `[defaults]` section: execution settings used when a payload omits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    #[serde(default = "default_total_pipeline_timeout_secs")]
    pub total_pipeline_timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_secs() -> u64 {
    3
}

fn default_step_timeout_secs() -> u64 {
    45
}

fn default_total_pipeline_timeout_secs() -> u64 {
    120
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            step_timeout_secs: default_step_timeout_secs(),
            total_pipeline_timeout_secs: default_total_pipeline_timeout_secs(),
        }
    }
}
