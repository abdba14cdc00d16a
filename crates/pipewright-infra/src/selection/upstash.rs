//! Upstash Redis REST selection-state store.
//!
//! - `POST {base}/set/{key}?EX={ttl}` with the JSON-encoded value as body
//! - `GET {base}/get/{key}` returning `{"result": <string | null>}`
//!
//! The REST token is held as a [`SecretString`] and only exposed when
//! building the `Authorization` header.

use std::time::Duration;

use pipewright_core::storage::SelectionStore;
use pipewright_types::error::StoreError;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Selection store backed by the Upstash Redis REST API.
#[derive(Debug, Clone)]
pub struct UpstashSelectionStore {
    client: reqwest::Client,
    base_url: Url,
    token: SecretString,
}

impl UpstashSelectionStore {
    pub fn new(client: reqwest::Client, rest_url: &str, token: SecretString) -> Result<Self, StoreError> {
        let base_url = Url::parse(rest_url.trim_end_matches('/'))
            .map_err(|e| StoreError::Unavailable(format!("invalid Upstash REST URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Unavailable(format!(
                "invalid Upstash REST URL: {rest_url}"
            )));
        }
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn command_url(&self, command: &str, key: &str) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable("Upstash REST URL cannot be a base".into()))?
            .pop_if_empty()
            .push(command)
            .push(key);
        Ok(url)
    }

    async fn call(&self, request: reqwest::RequestBuilder) -> Result<RestReply, StoreError> {
        let response = request
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(StoreError::Backend {
                status: status.as_u16(),
                message: body,
            });
        }

        let reply: RestReply =
            serde_json::from_str(&body).map_err(|e| StoreError::Encoding(e.to_string()))?;
        if let Some(message) = reply.error {
            return Err(StoreError::Backend {
                status: status.as_u16(),
                message,
            });
        }
        Ok(reply)
    }
}

impl SelectionStore for UpstashSelectionStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let url = self.command_url("get", key)?;
        let reply = self.call(self.client.get(url)).await?;
        match reply.result {
            None | Some(Value::Null) => Ok(None),
            // Values are stored JSON-encoded; anything else is returned as text.
            Some(Value::String(raw)) => Ok(Some(
                serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
            )),
            Some(other) => Ok(Some(other)),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), StoreError> {
        let mut url = self.command_url("set", key)?;
        url.query_pairs_mut()
            .append_pair("EX", &ttl.as_secs().max(1).to_string());
        let body = serde_json::to_string(value).map_err(|e| StoreError::Encoding(e.to_string()))?;
        self.call(self.client.post(url).body(body)).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::Json;
    use axum::Router;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use serde_json::json;

    #[derive(Clone, Default)]
    struct Fake {
        values: Arc<Mutex<HashMap<String, String>>>,
        ttls: Arc<Mutex<HashMap<String, String>>>,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "Bearer test-token")
    }

    async fn set_handler(
        State(fake): State<Fake>,
        Path(key): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
        body: String,
    ) -> axum::response::Response {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response();
        }
        fake.values.lock().unwrap().insert(key.clone(), body);
        if let Some(ex) = query.get("EX") {
            fake.ttls.lock().unwrap().insert(key, ex.clone());
        }
        Json(json!({"result": "OK"})).into_response()
    }

    async fn get_handler(
        State(fake): State<Fake>,
        Path(key): Path<String>,
        headers: HeaderMap,
    ) -> axum::response::Response {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response();
        }
        let value = fake.values.lock().unwrap().get(&key).cloned();
        Json(json!({"result": value})).into_response()
    }

    async fn spawn() -> (String, Fake) {
        let fake = Fake::default();
        let router = Router::new()
            .route("/set/{key}", post(set_handler))
            .route("/get/{key}", get(get_handler))
            .with_state(fake.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), fake)
    }

    fn store(base: &str, token: &str) -> UpstashSelectionStore {
        UpstashSelectionStore::new(reqwest::Client::new(), base, SecretString::from(token.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn set_and_get_round_trip_json() {
        let (base, fake) = spawn().await;
        let store = store(&base, "test-token");
        let key = "wf-1:output:selection_0a0b0c0d";

        store
            .set(key, &json!(["a1b2c3d4"]), Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(fake.values.lock().unwrap()[key], r#"["a1b2c3d4"]"#);
        assert_eq!(fake.ttls.lock().unwrap()[key], "3600");
        assert_eq!(store.get(key).await.unwrap(), Some(json!(["a1b2c3d4"])));
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let (base, _fake) = spawn().await;
        let store = store(&base, "test-token");
        assert_eq!(store.get("wf-1:output:nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn non_json_value_is_returned_as_text() {
        let (base, fake) = spawn().await;
        fake.values
            .lock()
            .unwrap()
            .insert("raw".to_string(), "plain words".to_string());
        let store = store(&base, "test-token");
        assert_eq!(store.get("raw").await.unwrap(), Some(json!("plain words")));
    }

    #[tokio::test]
    async fn rejected_token_is_a_backend_error() {
        let (base, _fake) = spawn().await;
        let store = store(&base, "wrong");
        let err = store.get("k").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend { status: 401, .. }));
    }

    #[test]
    fn invalid_base_url_rejected() {
        let err = UpstashSelectionStore::new(
            reqwest::Client::new(),
            "not a url",
            SecretString::from("t".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
