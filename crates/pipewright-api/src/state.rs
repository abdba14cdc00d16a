//! Application state wiring the engine to its infrastructure adapters.
//!
//! AppState holds the concrete executor used by both the CLI and the REST
//! API. The executor is generic over the transport and store ports; here it
//! is pinned to the reqwest transport and the configured selection backend.

use std::sync::Arc;
use std::time::Duration;

use pipewright_core::workflow::DagExecutor;
use pipewright_core::workflow::definition::{WorkflowError, parse_payload};
use pipewright_infra::http::{ReqwestTransport, build_client};
use pipewright_infra::notify::WebhookNotifier;
use pipewright_infra::selection::SelectionBackend;
use pipewright_types::config::EngineConfig;
use pipewright_types::workflow::ExecutionResult;
use serde_json::Value;

/// Executor pinned to the infra implementations.
pub type ConcreteExecutor = DagExecutor<ReqwestTransport, SelectionBackend>;

/// Why a payload did not produce an [`ExecutionResult`].
#[derive(Debug, thiserror::Error)]
pub enum RunRejection {
    /// Validation or decoding failed; nothing was dispatched.
    #[error(transparent)]
    Rejected(#[from] WorkflowError),

    /// The run exceeded its total pipeline timeout and was cancelled.
    #[error("Pipeline exceeded total timeout of {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub executor: Arc<ConcreteExecutor>,
    pub client: reqwest::Client,
}

impl AppState {
    /// Wire the executor from the engine configuration.
    pub fn init(config: EngineConfig) -> Self {
        let client = build_client(&config.http);
        let store = SelectionBackend::from_config(&config.selection_store, client.clone());
        tracing::info!(backend = ?store.kind(), "selection store ready");

        let executor = DagExecutor::new(ReqwestTransport::new(client.clone()), store)
            .with_selection_ttl(Duration::from_secs(config.selection_store.ttl_secs));

        Self {
            config: Arc::new(config),
            executor: Arc::new(executor),
            client,
        }
    }

    /// Validate, decode and execute one invocation payload.
    ///
    /// The run is bounded by its resolved `total_pipeline_timeout`.
    pub async fn execute_payload(&self, payload: &Value) -> Result<ExecutionResult, RunRejection> {
        let spec = match parse_payload(payload) {
            Ok(spec) => spec,
            Err(e) => {
                if let WorkflowError::ValidationError(problems) = &e {
                    tracing::warn!(problems = problems.len(), "rejecting invalid workflow payload");
                } else {
                    tracing::warn!(error = %e, "rejecting undecodable workflow payload");
                }
                return Err(e.into());
            }
        };

        let settings = spec.settings.resolve(&self.config.defaults);
        let notifier = WebhookNotifier::new(self.client.clone(), settings.webhook_url.clone())
            .with_timeout(Duration::from_secs(self.config.http.notification_timeout_secs));

        let run = self.executor.execute(&spec, &settings, &notifier);
        match tokio::time::timeout(settings.total_timeout, run).await {
            Ok(result) => Ok(result),
            Err(_) => {
                tracing::error!(
                    workflow = spec.workflow_name.as_deref().unwrap_or(""),
                    timeout_secs = settings.total_timeout.as_secs(),
                    "workflow exceeded total pipeline timeout"
                );
                Err(RunRejection::TimedOut(settings.total_timeout))
            }
        }
    }
}
