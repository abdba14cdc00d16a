//! Outbound HTTP: shared client construction and the step transport.

pub mod transport;

pub use transport::ReqwestTransport;

use pipewright_types::config::HttpConfig;

/// Build the shared reqwest client.
///
/// Per-request timeouts are applied by callers; redirects are followed with
/// reqwest's default policy.
pub fn build_client(config: &HttpConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .unwrap_or_default()
}
