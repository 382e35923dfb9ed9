use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod catalog;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod guard;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod session;

use mcp::McpEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<McpEngine>,
}

impl AppState {
    pub fn new(engine: Arc<McpEngine>) -> Self {
        Self { engine }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .route(http::handlers::MCP_ENDPOINT, post(http::handlers::mcp_endpoint))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::catalog::{MethodCatalog, MethodDefinition, ResourceCatalog, ResourceDefinition};
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::domain::tools::{ToolCall, ToolInvoker};
    use crate::errors::McpError;

    use super::*;

    const ACCEPT_BOTH: &str = "application/json, text/event-stream";

    struct Echo;

    #[async_trait]
    impl ToolInvoker for Echo {
        async fn invoke(&self, call: &ToolCall) -> Result<Value, McpError> {
            Ok(json!({
                "content": [{"type": "text", "text": call.arguments.get("text").cloned().unwrap_or(Value::Null)}]
            }))
        }
    }

    fn config(capacity: &str) -> Config {
        let capacity = capacity.to_string();
        Config::from_lookup(move |key| match key {
            "MCP_RATE_BUCKET_CAPACITY" => Some(capacity.clone()),
            "MCP_RATE_REFILL_PER_SECOND" => Some("0".to_string()),
            "MCP_MAX_REQUEST_BYTES" => Some("1024".to_string()),
            "MCP_SERVER_NAME" => Some("apps-test".to_string()),
            "MCP_SERVER_VERSION" => Some("9.9.9".to_string()),
            _ => None,
        })
        .expect("valid config")
    }

    fn app_with_capacity(capacity: &str) -> Router {
        let engine = McpEngine::builder(&config(capacity))
            .clock(Arc::new(ManualClock::new(1_700_000_000_000)))
            .methods(MethodCatalog::new(vec![MethodDefinition::new("echo")
                .with_input_schema(json!({"type": "object", "required": ["text"]}))]))
            .resources(ResourceCatalog::new(vec![ResourceDefinition::new("ui://app")
                .with_mime_type("text/html")
                .with_source("inline:<p>app</p>")]))
            .tool_invoker(Arc::new(Echo))
            .build();
        build_app(AppState::new(Arc::new(engine)))
    }

    fn app() -> Router {
        app_with_capacity("50")
    }

    fn mcp_request(body: &str) -> Request<Body> {
        Request::builder()
            .uri("/mcp")
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, ACCEPT_BOTH)
            .body(Body::from(body.to_string()))
            .expect("request build")
    }

    fn assert_protocol_headers(response: &Response, version: &str) {
        assert_eq!(response.headers()["mcp-protocol-version"], version);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    }

    fn versioned_ping(version: &str) -> Request<Body> {
        Request::builder()
            .uri("/mcp")
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, ACCEPT_BOTH)
            .header("MCP-Protocol-Version", version)
            .body(Body::from(r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#))
            .expect("request build")
    }

    async fn body_bytes(response: Response) -> axum::body::Bytes {
        response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).expect("valid json response")
    }

    #[tokio::test]
    async fn health_reports_limiter_and_sessions() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "OK");
        assert_eq!(body["rateLimiter"]["capacity"], 50);
        assert_eq!(body["uiSessions"], 0);
    }

    #[tokio::test]
    async fn discovery_names_the_endpoint() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/.well-known/mcp")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["mcp_endpoint"], "/mcp");
        assert_eq!(body["name"], "apps-test");
        assert_eq!(body["version"], "9.9.9");
    }

    #[tokio::test]
    async fn root_get_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn initialize_returns_result_with_protocol_headers() {
        let response = app()
            .oneshot(mcp_request(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"capabilities":{}}}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["mcp-protocol-version"],
            crate::guard::DEFAULT_PROTOCOL_VERSION
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

        let body = body_json(response).await;
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["serverInfo"]["name"], "apps-test");
        assert!(body["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn unknown_method_is_an_in_protocol_error() {
        let response = app()
            .oneshot(mcp_request(r#"{"jsonrpc":"2.0","id":7,"method":"prompts/list"}"#))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], 7);
        assert_eq!(body["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn notification_has_no_body() {
        let response = app()
            .oneshot(mcp_request(
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_protocol_headers(&response, crate::guard::DEFAULT_PROTOCOL_VERSION);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let response = app()
            .oneshot(mcp_request("{not json"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32700);
        assert!(body["id"].is_null());
    }

    #[tokio::test]
    async fn batch_is_rejected_as_invalid_request() {
        let response = app()
            .oneshot(mcp_request(r#"[{"jsonrpc":"2.0","id":1,"method":"ping"}]"#))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn tools_call_reaches_the_invoker() {
        let response = app()
            .oneshot(mcp_request(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"echo","arguments":{"text":"hi"}}}"#,
            ))
            .await
            .expect("request execution");

        let body = body_json(response).await;
        assert_eq!(body["id"], 3);
        assert_eq!(body["result"]["content"][0]["text"], "hi");
    }

    #[tokio::test]
    async fn resources_read_serves_inline_content() {
        let response = app()
            .oneshot(mcp_request(
                r#"{"jsonrpc":"2.0","id":4,"method":"resources/read","params":{"uri":"ui://app"}}"#,
            ))
            .await
            .expect("request execution");

        let body = body_json(response).await;
        assert_eq!(body["result"]["contents"][0]["text"], "<p>app</p>");
        assert_eq!(body["result"]["contents"][0]["mimeType"], "text/html");
    }

    #[tokio::test]
    async fn stream_opens_an_event_stream() {
        let response = app()
            .oneshot(mcp_request(r#"{"jsonrpc":"2.0","id":5,"method":"stream"}"#))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(body_bytes(response).await, ":ok\n\n");
    }

    #[tokio::test]
    async fn ui_session_flow_over_http() {
        let app = app();
        let response = app
            .clone()
            .oneshot(mcp_request(
                r#"{"jsonrpc":"2.0","id":1,"method":"ui/initialize","params":{"resourceUri":"ui://app"}}"#,
            ))
            .await
            .expect("request execution");
        let body = body_json(response).await;
        let session_id = body["result"]["sessionId"]
            .as_str()
            .expect("session id")
            .to_string();

        let request = Request::builder()
            .uri("/mcp")
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, ACCEPT_BOTH)
            .header("x-mcp-session-id", session_id)
            .body(Body::from(
                r#"{"jsonrpc":"2.0","id":2,"method":"ui/message","params":{"message":"hello"}}"#,
            ))
            .expect("request build");
        let body = body_json(app.oneshot(request).await.expect("request execution")).await;
        assert_eq!(body["result"]["acknowledged"], true);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_before_parsing() {
        let oversized = format!(
            r#"{{"jsonrpc":"2.0","id":1,"method":"ping","params":{{"pad":"{}"}}}}"#,
            "x".repeat(2048)
        );
        let response = app()
            .oneshot(mcp_request(&oversized))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_protocol_headers(&response, crate::guard::DEFAULT_PROTOCOL_VERSION);
        let body = body_json(response).await;
        assert_eq!(body["code"], "payload_too_large");
    }

    #[tokio::test]
    async fn missing_event_stream_accept_is_bad_request() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/mcp")
                    .method("POST")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::ACCEPT, "application/json")
                    .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_protocol_headers(&response, crate::guard::DEFAULT_PROTOCOL_VERSION);
        let body = body_json(response).await;
        assert_eq!(body["code"], "invalid_accept");
    }

    #[tokio::test]
    async fn exhausted_bucket_returns_too_many_requests() {
        let app = app_with_capacity("1");
        let first = app
            .clone()
            .oneshot(mcp_request(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
            .await
            .expect("request execution");
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(mcp_request(r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#))
            .await
            .expect("request execution");
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_protocol_headers(&second, crate::guard::DEFAULT_PROTOCOL_VERSION);
        let body = body_json(second).await;
        assert_eq!(body["code"], "rate_limited");
    }

    #[tokio::test]
    async fn supported_protocol_version_is_echoed() {
        let response = app()
            .oneshot(versioned_ping("2025-06-18"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        assert_protocol_headers(&response, "2025-06-18");
        let body = body_json(response).await;
        assert_eq!(body["result"]["ok"], true);
    }

    #[tokio::test]
    async fn unsupported_protocol_version_falls_back_to_default() {
        let response = app()
            .oneshot(versioned_ping("1999-01-01"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        assert_protocol_headers(&response, crate::guard::DEFAULT_PROTOCOL_VERSION);
        let body = body_json(response).await;
        assert_eq!(body["id"], 9);
    }
}
