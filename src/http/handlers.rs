//! Axum HTTP handlers for the web server
//!
//! Provides the primary Model Context Protocol endpoint, and general metadata endpoints.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, IntoResponseParts, Response},
    Json,
};
use axum_extra::{headers::CacheControl, TypedHeader};
use serde::Serialize;
use serde_json::Value;

use crate::domain::system::health_report;
use crate::guard::headers::{resolve_protocol_version, PROTOCOL_VERSION_HEADER};
use crate::guard::{InboundCall, SUPPORTED_PROTOCOL_VERSIONS};
use crate::mcp::{Dispatch, Reply};
use crate::AppState;

pub const MCP_ENDPOINT: &str = "/mcp";

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: String,
    pub version: String,
    pub mcp_endpoint: &'static str,
    pub protocol_versions: &'static [&'static str],
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(health_report(
        state.engine.rate_limiter(),
        state.engine.sessions(),
    ))
}

pub async fn discovery(State(state): State<AppState>) -> Json<DiscoveryResponse> {
    let server = state.engine.server_info();
    Json(DiscoveryResponse {
        name: server.name.clone(),
        version: server.version.clone(),
        mcp_endpoint: MCP_ENDPOINT,
        protocol_versions: SUPPORTED_PROTOCOL_VERSIONS,
    })
}

pub async fn mcp_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let offered_version = resolve_protocol_version(
        headers
            .get(PROTOCOL_VERSION_HEADER)
            .and_then(|value| value.to_str().ok()),
    );

    match state.engine.process(InboundCall::http(headers, body)).await {
        Ok(dispatch) => render(dispatch),
        Err(err) => (protocol_headers(offered_version.to_string()), err).into_response(),
    }
}

fn render(dispatch: Dispatch) -> Response {
    let headers = protocol_headers(dispatch.protocol_version);
    match dispatch.reply {
        Reply::Envelope(envelope) => (StatusCode::OK, headers, Json(envelope)).into_response(),
        Reply::NoContent => (StatusCode::NO_CONTENT, headers, ()).into_response(),
        Reply::EventStream(body) => (
            StatusCode::OK,
            headers,
            [(header::CONTENT_TYPE, "text/event-stream")],
            body,
        )
            .into_response(),
    }
}

fn protocol_headers(version: String) -> impl IntoResponseParts {
    (
        TypedHeader(CacheControl::new().with_no_store()),
        [(HeaderName::from_static(PROTOCOL_VERSION_HEADER), version)],
    )
}
