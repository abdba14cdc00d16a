//! Single-step dispatch: template resolution, HTTP call with retries, and
//! response extraction.

use std::time::Duration;

use pipewright_types::text::{MAX_ERROR_LEN, bound_error, clip};
use pipewright_types::workflow::{ExecutionSettings, StepDescriptor};
use serde_json::{Map, Value};
use thiserror::Error;

use super::extract::extract_outputs;
use super::retry::{FailureClass, RetryPolicy};
use super::template::resolve_template;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why a step could not produce outputs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    /// 4xx response. Never retried.
    #[error("HTTP {status}: {body}")]
    ClientStatus { status: u16, body: String },

    /// Every attempt failed with a retryable error.
    #[error("Step {step_name} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        step_name: String,
        attempts: u32,
        last_error: String,
    },

    /// Unclassified failure. Never retried.
    #[error("{0}")]
    Unexpected(String),
}

// ---------------------------------------------------------------------------
// StepDispatcher
// ---------------------------------------------------------------------------

/// Executes one step's HTTP call under a retry policy.
pub struct StepDispatcher<'a, T: HttpTransport> {
    transport: &'a T,
    policy: RetryPolicy,
    step_timeout: Duration,
}

impl<'a, T: HttpTransport> StepDispatcher<'a, T> {
    pub fn new(transport: &'a T, policy: RetryPolicy, step_timeout: Duration) -> Self {
        Self {
            transport,
            policy,
            step_timeout,
        }
    }

    pub fn from_settings(transport: &'a T, settings: &ExecutionSettings) -> Self {
        Self::new(
            transport,
            RetryPolicy::from_settings(settings),
            settings.step_timeout,
        )
    }

    /// Build the request from the step template and `context`, call the
    /// service, and map the response onto the step's declared outputs.
    pub async fn dispatch(
        &self,
        step: &StepDescriptor,
        context: &Map<String, Value>,
    ) -> Result<Map<String, Value>, StepError> {
        let payload = resolve_template(&step.input_prep_config.mapping, context);
        tracing::debug!(
            usid = %step.usid,
            method = %step.method,
            url = %step.service_url,
            payload = %payload,
            "prepared step request"
        );

        let request = HttpRequest {
            method: step.method,
            url: step.service_url.clone(),
            headers: step.headers.clone(),
            payload,
            timeout: self.step_timeout,
        };

        let mut attempt = 1;
        loop {
            if let Some(delay) = self.policy.delay_before(attempt) {
                tokio::time::sleep(delay).await;
            }

            let (class, error) = match self.attempt(request.clone()).await {
                Ok(response) if response.is_success() => {
                    tracing::debug!(usid = %step.usid, attempt, status = response.status, "step call succeeded");
                    return Ok(extract_outputs(&response.body, &step.outputs));
                }
                Ok(response) => {
                    let class = RetryPolicy::classify_status(&response);
                    let body = clip(&response.body, MAX_ERROR_LEN);
                    if class == FailureClass::Terminal {
                        return Err(StepError::ClientStatus {
                            status: response.status,
                            body,
                        });
                    }
                    (class, format!("HTTP {}: {}", response.status, body))
                }
                Err(e) => {
                    let class = RetryPolicy::classify_transport(&e);
                    if class == FailureClass::Terminal {
                        return Err(StepError::Unexpected(bound_error(&e.to_string())));
                    }
                    (class, e.to_string())
                }
            };

            if !self.policy.should_retry(attempt, class) {
                return Err(StepError::Exhausted {
                    step_name: step.step_name.clone(),
                    attempts: self.policy.total_attempts(),
                    last_error: bound_error(&error),
                });
            }

            tracing::warn!(
                usid = %step.usid,
                step_name = %step.step_name,
                attempt,
                max_attempts = self.policy.total_attempts(),
                error = %error,
                "step attempt failed; retrying"
            );
            attempt += 1;
        }
    }

    async fn attempt(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let timeout = request.timeout;
        match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(format!(
                "no response within {}s",
                timeout.as_secs_f64()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
