//! Sequential DAG executor.
//!
//! `DagExecutor` drives one workflow run end to end: it orders the steps,
//! gates each one on its selection dependencies, checks data-dependency
//! availability, dispatches the HTTP call, merges outputs, and emits
//! lifecycle notifications. Steps run strictly one at a time in scheduler
//! order even where the graph would allow concurrent branches.
//!
//! `execute` never returns an error: every failure ends up in the
//! `ExecutionResult`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use pipewright_types::event::{NotificationPayload, StepPosition, WorkflowEvent};
use pipewright_types::text::bound_error;
use pipewright_types::workflow::{ExecutionResult, ExecutionSettings, StepDescriptor, StepStatus, WorkflowSpec};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::time::Instant;

use super::context::{OutputStore, RunContext};
use super::dag;
use super::definition::{WorkflowError, resolve_workflow_id};
use super::dispatcher::{StepDispatcher, StepError};
use super::selection::{GateDecision, SelectionGate};
use crate::event::Notifier;
use crate::storage::SelectionStore;
use crate::transport::HttpTransport;

/// Expiry of outputs mirrored to the selection-state store.
pub const DEFAULT_SELECTION_TTL: Duration = Duration::from_secs(3600);

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Signals that halt a run. Selection rejections are not in here: they
/// abort a single step and the run continues.
#[derive(Debug, Error)]
pub enum RunError {
    /// Cycle or other configuration problem detected before any dispatch.
    #[error(transparent)]
    Configuration(#[from] WorkflowError),

    /// A data dependency was absent from the output store at dispatch time.
    #[error("{}", missing_dependencies_message(.missing))]
    MissingDependency { usid: String, missing: Vec<String> },

    /// The step's HTTP call failed terminally or exhausted its retries.
    #[error("{source}")]
    StepFailed {
        usid: String,
        #[source]
        source: StepError,
    },
}

fn missing_dependencies_message(missing: &[String]) -> String {
    bound_error(&format!("Missing dependencies: {missing:?}"))
}

/// What happened to a step that did not halt the run.
enum StepOutcome {
    Completed,
    Aborted,
}

// ---------------------------------------------------------------------------
// DagExecutor
// ---------------------------------------------------------------------------

/// Runs workflows against an HTTP transport and a selection-state store.
pub struct DagExecutor<T: HttpTransport, S: SelectionStore> {
    transport: T,
    store: S,
    selection_ttl: Duration,
}

impl<T: HttpTransport, S: SelectionStore> DagExecutor<T, S> {
    pub fn new(transport: T, store: S) -> Self {
        Self {
            transport,
            store,
            selection_ttl: DEFAULT_SELECTION_TTL,
        }
    }

    pub fn with_selection_ttl(mut self, ttl: Duration) -> Self {
        self.selection_ttl = ttl;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute one workflow run.
    pub async fn execute<N: Notifier>(
        &self,
        spec: &WorkflowSpec,
        settings: &ExecutionSettings,
        notifier: &N,
    ) -> ExecutionResult {
        let started = Instant::now();
        let workflow_id = resolve_workflow_id(spec);
        let outputs = OutputStore::seeded(spec.original_input.as_ref(), &spec.input_data);
        let mut run = RunContext::new(workflow_id, spec.namespace.clone(), outputs);

        tracing::info!(
            workflow_id = %run.workflow_id,
            namespace = %run.namespace,
            workflow = spec.workflow_name.as_deref().unwrap_or(""),
            total_steps = spec.steps.len(),
            "starting workflow execution"
        );

        self.emit(
            notifier,
            &run,
            WorkflowEvent::WorkflowStarted {
                workflow_name: spec.workflow_name.clone(),
                total_steps: spec.steps.len(),
            },
        )
        .await;

        let order = match dag::execution_order(&spec.steps) {
            Ok(order) => order,
            Err(e) => {
                return self
                    .fail(notifier, run, Vec::new(), RunError::from(e), started)
                    .await;
            }
        };

        let by_usid: HashMap<&str, &StepDescriptor> =
            spec.steps.iter().map(|s| (s.usid.as_str(), s)).collect();
        let total_steps = order.len();

        for (index, usid) in order.iter().enumerate() {
            let Some(step) = by_usid.get(usid.as_str()) else {
                continue;
            };
            let position = StepPosition {
                step_name: step.step_name.clone(),
                usid: step.usid.clone(),
                step_index: index + 1,
                total_steps,
            };

            match self
                .run_step(&mut run, step, position, settings, notifier)
                .await
            {
                Ok(StepOutcome::Completed | StepOutcome::Aborted) => {}
                Err(e) => return self.fail(notifier, run, order, e, started).await,
            }
        }

        self.succeed(notifier, run, order, started).await
    }

    async fn run_step<N: Notifier>(
        &self,
        run: &mut RunContext,
        step: &StepDescriptor,
        position: StepPosition,
        settings: &ExecutionSettings,
        notifier: &N,
    ) -> Result<StepOutcome, RunError> {
        // Selection gate: rejection aborts this step only.
        let gate = SelectionGate::new(&self.store, &run.workflow_id);
        if let GateDecision::Abort(reason) = gate.check(step).await {
            tracing::warn!(
                workflow_id = %run.workflow_id,
                usid = %step.usid,
                step_name = %step.step_name,
                reason = %reason,
                "step aborted by selection dependency"
            );
            run.state.mark(&step.usid, StepStatus::Aborted);
            self.emit(
                notifier,
                run,
                WorkflowEvent::StepAborted {
                    step: position,
                    reason: reason.to_string(),
                },
            )
            .await;
            return Ok(StepOutcome::Aborted);
        }

        // Data dependencies: anything missing halts the run.
        let missing = run.outputs.missing(step.data_dependencies());
        if !missing.is_empty() {
            let error = RunError::MissingDependency {
                usid: step.usid.clone(),
                missing,
            };
            self.record_failure(notifier, run, position, &error).await;
            return Err(error);
        }

        self.emit(notifier, run, WorkflowEvent::StepStarted(position.clone()))
            .await;

        let step_started = Instant::now();
        let dispatcher = StepDispatcher::from_settings(&self.transport, settings);
        let outputs = match dispatcher.dispatch(step, run.outputs.as_map()).await {
            Ok(outputs) => outputs,
            Err(source) => {
                let error = RunError::StepFailed {
                    usid: step.usid.clone(),
                    source,
                };
                self.record_failure(notifier, run, position, &error).await;
                return Err(error);
            }
        };
        let execution_time_secs = step_started.elapsed().as_secs_f64();

        for (name, value) in &outputs {
            run.outputs.insert(name, value.clone());
            let key = run.store_key(name);
            if let Err(e) = self.store.set(&key, value, self.selection_ttl).await {
                tracing::warn!(key = %key, error = %e, "failed to mirror output to selection store");
            }
        }
        run.state.mark(&step.usid, StepStatus::Completed);

        tracing::info!(
            workflow_id = %run.workflow_id,
            usid = %step.usid,
            step_name = %step.step_name,
            elapsed_secs = execution_time_secs,
            "step completed"
        );

        self.emit(
            notifier,
            run,
            WorkflowEvent::StepCompleted {
                step: position,
                outputs,
                execution_time_secs,
            },
        )
        .await;

        Ok(StepOutcome::Completed)
    }

    async fn record_failure<N: Notifier>(
        &self,
        notifier: &N,
        run: &mut RunContext,
        position: StepPosition,
        error: &RunError,
    ) {
        tracing::error!(
            workflow_id = %run.workflow_id,
            usid = %position.usid,
            step_name = %position.step_name,
            error = %error,
            "step failed"
        );
        run.state.mark(&position.usid, StepStatus::Failed);
        self.emit(
            notifier,
            run,
            WorkflowEvent::StepFailed {
                step: position,
                error: error.to_string(),
            },
        )
        .await;
    }

    async fn succeed<N: Notifier>(
        &self,
        notifier: &N,
        run: RunContext,
        order: Vec<String>,
        started: Instant,
    ) -> ExecutionResult {
        let result = build_result(run, order, None, started);
        tracing::info!(
            workflow_id = %result.workflow_id,
            steps_completed = result.steps_completed,
            steps_aborted = result.steps_aborted,
            elapsed_secs = result.execution_time_secs,
            "workflow completed"
        );

        let event = WorkflowEvent::WorkflowCompleted {
            final_result: result.final_result.clone(),
            execution_time_secs: result.execution_time_secs,
            steps_completed: result.steps_completed,
            steps_failed: result.steps_failed,
            steps_aborted: result.steps_aborted,
        };
        self.emit_for(notifier, &result.workflow_id, &result.namespace, event)
            .await;
        result
    }

    async fn fail<N: Notifier>(
        &self,
        notifier: &N,
        run: RunContext,
        order: Vec<String>,
        error: RunError,
        started: Instant,
    ) -> ExecutionResult {
        let message = error.to_string();
        let result = build_result(run, order, Some(message.clone()), started);
        tracing::error!(
            workflow_id = %result.workflow_id,
            steps_completed = result.steps_completed,
            error = %message,
            "workflow failed"
        );

        let event = WorkflowEvent::WorkflowFailed {
            error: message,
            execution_time_secs: result.execution_time_secs,
            steps_completed: result.steps_completed,
        };
        self.emit_for(notifier, &result.workflow_id, &result.namespace, event)
            .await;
        result
    }

    async fn emit<N: Notifier>(&self, notifier: &N, run: &RunContext, event: WorkflowEvent) {
        self.emit_for(notifier, &run.workflow_id, &run.namespace, event)
            .await;
    }

    async fn emit_for<N: Notifier>(
        &self,
        notifier: &N,
        workflow_id: &str,
        namespace: &str,
        event: WorkflowEvent,
    ) {
        let payload = NotificationPayload::new(&event, workflow_id, namespace, Utc::now());
        if let Err(e) = notifier.notify(&payload).await {
            tracing::warn!(
                workflow_id,
                event = payload.event.as_str(),
                error = %e,
                "notification delivery failed"
            );
        }
    }
}

fn build_result(
    run: RunContext,
    order: Vec<String>,
    error: Option<String>,
    started: Instant,
) -> ExecutionResult {
    let final_result = run.outputs.final_result();
    let state = run.state;
    let outputs: Map<String, Value> = run.outputs.into_map();
    ExecutionResult {
        success: error.is_none(),
        workflow_id: run.workflow_id,
        namespace: run.namespace,
        execution_time_secs: started.elapsed().as_secs_f64(),
        execution_order: order,
        steps_completed: state.completed().len(),
        steps_failed: state.failed().len(),
        steps_aborted: state.aborted().len(),
        completed_steps: state.completed().to_vec(),
        failed_steps: state.failed().to_vec(),
        aborted_steps: state.aborted().to_vec(),
        final_result,
        outputs,
        error,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use pipewright_types::error::{NotifyError, StoreError};
    use serde_json::json;

    use crate::transport::{HttpRequest, HttpResponse, TransportError};

    // -----------------------------------------------------------------------
    // Fakes
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct UrlTransport {
        replies: Mutex<HashMap<String, VecDeque<(u16, String)>>>,
        calls: Mutex<Vec<HttpRequest>>,
    }

    impl UrlTransport {
        fn reply(self, url: &str, status: u16, body: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back((status, body.to_string()));
            self
        }

        fn urls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|r| r.url.clone()).collect()
        }
    }

    impl HttpTransport for UrlTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let next = self
                .replies
                .lock()
                .unwrap()
                .get_mut(&request.url)
                .and_then(VecDeque::pop_front);
            self.calls.lock().unwrap().push(request);
            match next {
                Some((status, body)) => Ok(HttpResponse { status, body }),
                None => Err(TransportError::Network("no route".into())),
            }
        }
    }

    #[derive(Default)]
    struct MemStore {
        values: Mutex<HashMap<String, Value>>,
        fail_writes: bool,
    }

    impl SelectionStore for MemStore {
        async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &Value, _ttl: Duration) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Unavailable("read-only".into()));
            }
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<NotificationPayload>>,
        fail: bool,
    }

    impl Recorder {
        fn names(&self) -> Vec<String> {
            self.events.lock().unwrap().iter().map(|p| p.event.clone()).collect()
        }
    }

    impl Notifier for Recorder {
        async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
            self.events.lock().unwrap().push(payload.clone());
            if self.fail {
                return Err(NotifyError::Status(500));
            }
            Ok(())
        }
    }

    fn spec(steps: Value) -> WorkflowSpec {
        serde_json::from_value(json!({
            "workflow_id": "wf-test",
            "namespace": "ns",
            "original_input": "hello",
            "STEPS_CONFIG": steps,
        }))
        .unwrap()
    }

    fn fast_settings() -> ExecutionSettings {
        ExecutionSettings {
            max_retries: 0,
            retry_delay: Duration::from_millis(10),
            ..ExecutionSettings::default()
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn single_step_success() {
        let transport = UrlTransport::default().reply("http://a", 200, r#"{"echo": "hi"}"#);
        let executor = DagExecutor::new(transport, MemStore::default());
        let notifier = Recorder::default();
        let spec = spec(json!([{
            "step_name": "echo", "usid": "aaaaaaaa", "service_url": "http://a",
            "outputs": ["echo"], "input_prep_config": {"mapping": {"m": "{{original_input}}"}}
        }]));

        let result = executor.execute(&spec, &fast_settings(), &notifier).await;
        assert!(result.success);
        assert_eq!(result.workflow_id, "wf-test");
        assert_eq!(result.outputs["echo"], "hi");
        assert_eq!(result.outputs["original_input"], "hello");
        assert_eq!(
            notifier.names(),
            vec!["workflow_started", "step_started", "step_completed", "workflow_completed"]
        );
        assert_eq!(
            executor.store().values.lock().unwrap()["wf-test:output:echo"],
            json!("hi")
        );
        let sent = executor.transport().calls.lock().unwrap();
        assert_eq!(sent[0].payload, json!({"m": "hello"}));
    }

    #[tokio::test]
    async fn failing_step_halts_and_reports() {
        let transport = UrlTransport::default()
            .reply("http://a", 200, r#"{"x": 1}"#)
            .reply("http://b", 422, "bad input");
        let executor = DagExecutor::new(transport, MemStore::default());
        let notifier = Recorder::default();
        let spec = spec(json!([
            {"step_name": "a", "usid": "aaaaaaaa", "service_url": "http://a", "outputs": ["x"]},
            {"step_name": "b", "usid": "bbbbbbbb", "service_url": "http://b", "outputs": ["y"], "dependencies": ["x"]},
            {"step_name": "c", "usid": "cccccccc", "service_url": "http://c", "outputs": ["z"], "dependencies": ["y"]}
        ]));

        let result = executor.execute(&spec, &fast_settings(), &notifier).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("HTTP 422: bad input"));
        assert_eq!(result.completed_steps, vec!["aaaaaaaa"]);
        assert_eq!(result.failed_steps, vec!["bbbbbbbb"]);
        assert_eq!(result.status_of("cccccccc"), StepStatus::NotReached);
        assert_eq!(result.outputs["x"], 1);
        assert_eq!(executor.transport().urls(), vec!["http://a", "http://b"]);
        assert_eq!(notifier.names().last().map(String::as_str), Some("workflow_failed"));
        assert!(notifier.names().contains(&"step_failed".to_string()));
    }

    #[tokio::test]
    async fn notification_and_store_failures_do_not_affect_run() {
        let transport = UrlTransport::default().reply("http://a", 200, r#"{"result": "done"}"#);
        let store = MemStore {
            fail_writes: true,
            ..MemStore::default()
        };
        let executor = DagExecutor::new(transport, store);
        let notifier = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let spec = spec(json!([
            {"step_name": "a", "usid": "aaaaaaaa", "service_url": "http://a", "outputs": ["result"]}
        ]));

        let result = executor.execute(&spec, &fast_settings(), &notifier).await;
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.final_result, json!("done"));
        assert_eq!(notifier.names().len(), 4);
    }

    #[tokio::test]
    async fn missing_dependency_emits_step_failed_without_dispatch() {
        let executor = DagExecutor::new(UrlTransport::default(), MemStore::default());
        let notifier = Recorder::default();
        let spec = spec(json!([
            {"step_name": "a", "usid": "aaaaaaaa", "service_url": "http://a", "outputs": ["x"], "dependencies": ["foo"]}
        ]));

        let result = executor.execute(&spec, &fast_settings(), &notifier).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(r#"Missing dependencies: ["foo"]"#));
        assert!(executor.transport().urls().is_empty());
        assert_eq!(
            notifier.names(),
            vec!["workflow_started", "step_failed", "workflow_failed"]
        );
    }

    #[tokio::test]
    async fn long_missing_dependency_list_is_bounded() {
        let executor = DagExecutor::new(UrlTransport::default(), MemStore::default());
        let deps: Vec<String> = (0..40).map(|i| format!("upstream_output_{i}")).collect();
        let spec = spec(json!([
            {"step_name": "a", "usid": "aaaaaaaa", "service_url": "http://a", "outputs": ["x"], "dependencies": deps}
        ]));

        let result = executor.execute(&spec, &fast_settings(), &Recorder::default()).await;
        let error = result.error.unwrap();
        assert!(error.starts_with(r#"Missing dependencies: ["upstream_output_0""#));
        assert!(error.ends_with("..."));
        assert_eq!(error.chars().count(), 203);
    }

    #[tokio::test]
    async fn generated_workflow_id_when_absent() {
        let transport = UrlTransport::default().reply("http://a", 200, "ok");
        let executor = DagExecutor::new(transport, MemStore::default());
        let mut spec = spec(json!([
            {"step_name": "a", "usid": "aaaaaaaa", "service_url": "http://a", "outputs": ["x"]}
        ]));
        spec.workflow_id = None;

        let result = executor
            .execute(&spec, &fast_settings(), &crate::event::NoopNotifier)
            .await;
        assert!(result.success);
        assert_eq!(result.workflow_id.len(), 16);
        assert_eq!(result.outputs["x"], "ok");
    }
}
