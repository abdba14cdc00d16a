//! HTTP transport port.
//!
//! The dispatcher describes each attempt as an `HttpRequest` and receives
//! the raw status and body back. Implementations live in pipewright-infra.

use std::collections::BTreeMap;
use std::time::Duration;

use pipewright_types::workflow::HttpMethod;
use serde_json::Value;
use thiserror::Error;

/// One outbound step call.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Resolved `input_prep_config.mapping`: query parameters for GET, JSON body otherwise.
    pub payload: Value,
    /// Upper bound for this single attempt.
    pub timeout: Duration,
}

/// Status and body of a completed exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

/// Failures below the HTTP status layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The attempt exceeded its timeout. Retryable.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection, DNS, TLS or body-transfer failure. Retryable.
    #[error("request error: {0}")]
    Network(String),

    /// The request could not be built or sent for a non-network reason. Terminal.
    #[error("{0}")]
    Request(String),
}

/// Trait for issuing step HTTP calls.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait HttpTransport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl std::future::Future<Output = Result<HttpResponse, TransportError>> + Send;
}
