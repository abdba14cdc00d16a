//! Webhook notification sink.
//!
//! POSTs each lifecycle payload as JSON to the run's configured URL. Without
//! a URL the notifier is inert.

use std::time::Duration;

use pipewright_core::event::Notifier;
use pipewright_types::error::NotifyError;
use pipewright_types::event::NotificationPayload;

/// Default per-delivery timeout.
pub const DEFAULT_NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()),
            timeout: DEFAULT_NOTIFICATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let Some(url) = self.url.as_deref() else {
            tracing::debug!(event = payload.event.as_str(), "no webhook configured; skipping notification");
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        tracing::debug!(event = payload.event.as_str(), "notification delivered");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Json;
    use chrono::Utc;
    use pipewright_types::event::WorkflowEvent;
    use serde_json::Value;

    type Received = Arc<Mutex<Vec<Value>>>;

    async fn spawn(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::default();
        let router = Router::new()
            .route(
                "/hook",
                post(
                    move |State(store): State<Received>, Json(body): Json<Value>| async move {
                        store.lock().unwrap().push(body);
                        status
                    },
                ),
            )
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}/hook"), received)
    }

    fn payload() -> NotificationPayload {
        let event = WorkflowEvent::WorkflowStarted {
            workflow_name: Some("demo".into()),
            total_steps: 2,
        };
        NotificationPayload::new(&event, "wf-1", "ns", Utc::now())
    }

    #[tokio::test]
    async fn delivers_json_payload() {
        let (url, received) = spawn(StatusCode::OK).await;
        let notifier = WebhookNotifier::new(reqwest::Client::new(), Some(url));

        notifier.notify(&payload()).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["event"], "workflow_started");
        assert_eq!(received[0]["workflow_id"], "wf-1");
        assert_eq!(received[0]["data"]["total_steps"], 2);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (url, _received) = spawn(StatusCode::INTERNAL_SERVER_ERROR).await;
        let notifier = WebhookNotifier::new(reqwest::Client::new(), Some(url));

        let err = notifier.notify(&payload()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Status(500)));
    }

    #[tokio::test]
    async fn without_url_is_a_no_op() {
        let notifier = WebhookNotifier::new(reqwest::Client::new(), Some("  ".into()));
        assert!(notifier.url().is_none());
        notifier.notify(&payload()).await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_delivery_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let notifier =
            WebhookNotifier::new(reqwest::Client::new(), Some(format!("http://{addr}/hook")));

        let err = notifier.notify(&payload()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Delivery(_)));
    }
}
