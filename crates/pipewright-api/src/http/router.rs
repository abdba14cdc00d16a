//! Axum router configuration with middleware.
//!
//! Middleware: CORS, request tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/execute", post(handlers::workflow::execute))
        .route("/health", get(handlers::health::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::Json;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use pipewright_types::config::EngineConfig;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(AppState::init(EngineConfig::default()))
    }

    async fn call(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_execute(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/execute")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn spawn_service(delay: Duration) -> String {
        let router = Router::new().route(
            "/step",
            axum::routing::post(move |Json(body): Json<Value>| async move {
                tokio::time::sleep(delay).await;
                Json(json!({"result": format!("echo: {}", body["message"].as_str().unwrap_or(""))}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/step")
    }

    fn payload(service_url: &str, total_timeout: u64) -> Value {
        json!({
            "workflow_id": "wf-http",
            "namespace": "tests",
            "original_input": "hello",
            "STEPS_CONFIG": [{
                "step_name": "echo",
                "usid": "a1b2c3d4",
                "service_url": service_url,
                "method": "POST",
                "dependencies": [],
                "outputs": ["result"],
                "input_prep_config": {"type": "json", "mapping": {"message": "{{original_input}}"}}
            }],
            "PIPELINE_SETTINGS": {
                "error_handling": {"max_retries": 0, "retry_delay": 0},
                "timeouts": {"step_timeout": 30, "total_pipeline_timeout": total_timeout}
            }
        })
    }

    #[tokio::test]
    async fn health_reports_service() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = call(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "pipewright");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_with_all_problems() {
        let (status, body) = call(app(), post_execute(json!({"namespace": "x"}).to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["validation_errors"], json!(["Missing STEPS_CONFIG"]));
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("Payload validation failed:\n")
        );
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let (status, body) = call(app(), post_execute("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn executes_workflow_against_live_service() {
        let url = spawn_service(Duration::ZERO).await;
        let (status, body) = call(app(), post_execute(payload(&url, 30).to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["workflow_id"], "wf-http");
        assert_eq!(body["execution_order"], json!(["a1b2c3d4"]));
        assert_eq!(body["final_result"], "echo: hello");
    }

    #[tokio::test]
    async fn pipeline_timeout_maps_to_gateway_timeout() {
        let url = spawn_service(Duration::from_secs(5)).await;
        let (status, body) = call(app(), post_execute(payload(&url, 1).to_string())).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"], "Pipeline exceeded total timeout of 1s");
    }
}
