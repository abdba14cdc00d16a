//! reqwest implementation of the step transport port.
//!
//! GET sends the resolved mapping as query parameters; every other method
//! sends it as a JSON body. Status codes are returned as-is for the
//! dispatcher to classify.

use pipewright_core::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use pipewright_types::workflow::HttpMethod;
use serde_json::Value;

/// Step transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match request.method {
            HttpMethod::Get => builder.query(&query_pairs(&request.payload)),
            _ => builder.json(&request.payload),
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;

        tracing::debug!(
            url = request.url.as_str(),
            status,
            body_len = body.len(),
            "step HTTP exchange completed"
        );

        Ok(HttpResponse { status, body })
    }
}

/// Flatten a mapping into query pairs: strings verbatim, other values as JSON text.
pub fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    match payload {
        Value::Object(fields) => fields
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_builder() {
        TransportError::Request(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::time::Duration;

    use axum::Json;
    use axum::Router;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use serde_json::json;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn request(method: HttpMethod, url: String, payload: Value) -> HttpRequest {
        let mut headers = BTreeMap::new();
        headers.insert("x-api-key".to_string(), "secret".to_string());
        HttpRequest {
            method,
            url,
            headers,
            payload,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn query_pairs_stringify_non_strings() {
        let mut pairs = query_pairs(&json!({"q": "rust", "n": 3, "tags": ["a"]}));
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("n".to_string(), "3".to_string()),
                ("q".to_string(), "rust".to_string()),
                ("tags".to_string(), r#"["a"]"#.to_string()),
            ]
        );
        assert!(query_pairs(&json!("scalar")).is_empty());
    }

    #[tokio::test]
    async fn post_sends_json_body_and_headers() {
        let router = Router::new().route(
            "/echo",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let key = headers
                    .get("x-api-key")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({"received": body, "key": key}))
            }),
        );
        let base = spawn(router).await;
        let transport = ReqwestTransport::new(reqwest::Client::new());

        let response = transport
            .send(request(HttpMethod::Post, format!("{base}/echo"), json!({"m": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["received"], json!({"m": "hi"}));
        assert_eq!(body["key"], "secret");
    }

    #[tokio::test]
    async fn get_sends_query_parameters() {
        let router = Router::new().route(
            "/search",
            get(|Query(params): Query<HashMap<String, String>>| async move { Json(params) }),
        );
        let base = spawn(router).await;
        let transport = ReqwestTransport::new(reqwest::Client::new());

        let response = transport
            .send(request(
                HttpMethod::Get,
                format!("{base}/search"),
                json!({"q": "dag", "limit": 5}),
            ))
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body, json!({"q": "dag", "limit": "5"}));
    }

    #[tokio::test]
    async fn error_statuses_are_returned_not_raised() {
        let router = Router::new().route(
            "/down",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try later") }),
        );
        let base = spawn(router).await;
        let transport = ReqwestTransport::new(reqwest::Client::new());

        let response = transport
            .send(request(HttpMethod::Post, format!("{base}/down"), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.body, "try later");
    }

    #[tokio::test]
    async fn slow_service_maps_to_timeout() {
        let router = Router::new().route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "late"
            }),
        );
        let base = spawn(router).await;
        let transport = ReqwestTransport::new(reqwest::Client::new());

        let mut req = request(HttpMethod::Post, format!("{base}/slow"), json!({}));
        req.timeout = Duration::from_millis(100);
        let err = transport.send(req).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let transport = ReqwestTransport::new(reqwest::Client::new());

        let err = transport
            .send(request(HttpMethod::Post, format!("http://{addr}/x"), json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }
}
