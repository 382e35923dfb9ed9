//! Lifecycle and liveness methods: `initialize`, `ping`, `health`, `stream`

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_mcp_sdk::schema::{
    Implementation, InitializeResult, ServerCapabilities, ServerCapabilitiesResources,
    ServerCapabilitiesTools,
};
use serde_json::{json, Map, Value};

use crate::clock::Clock;
use crate::errors::McpError;
use crate::guard::RateLimiter;
use crate::mcp::server::{MethodHandler, Outcome, RequestContext, ServerInfo};
use crate::session::UiSessionRegistry;

pub const STREAM_HANDSHAKE: &str = ":ok\n\n";

pub struct InitializeHandler {
    server: ServerInfo,
}

impl InitializeHandler {
    pub fn new(server: ServerInfo) -> Self {
        Self { server }
    }
}

#[async_trait]
impl MethodHandler for InitializeHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Outcome, McpError> {
        let initialize_result = InitializeResult {
            server_info: Implementation {
                name: self.server.name.clone(),
                version: self.server.version.clone(),
                title: None,
                description: None,
                icons: vec![],
                website_url: None,
            },
            capabilities: ServerCapabilities {
                tools: Some(ServerCapabilitiesTools {
                    list_changed: Some(false),
                }),
                resources: Some(ServerCapabilitiesResources {
                    subscribe: Some(false),
                    list_changed: Some(false),
                }),
                prompts: None,
                ..Default::default()
            },
            protocol_version: ctx.protocol_version.clone(),
            instructions: None,
            meta: None,
        };

        let mut result = serde_json::to_value(initialize_result)
            .map_err(|err| McpError::internal(format!("initialize result serialization: {err}")))?;

        if wants_logging(ctx) {
            if let Some(capabilities) = result
                .get_mut("capabilities")
                .and_then(Value::as_object_mut)
            {
                capabilities.insert("logging".to_string(), Value::Object(Map::new()));
            }
        }

        Ok(Outcome::Result(result))
    }
}

fn wants_logging(ctx: &RequestContext) -> bool {
    ctx.param("logging").is_some()
        || ctx
            .param("capabilities")
            .and_then(|capabilities| capabilities.get("logging"))
            .is_some()
}

pub struct PingHandler {
    clock: Arc<dyn Clock>,
}

impl PingHandler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl MethodHandler for PingHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Outcome, McpError> {
        let timestamp = i64::try_from(self.clock.now_ms())
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        let mut result = json!({ "ok": true, "timestamp": timestamp });
        if let Some(params) = ctx.params_object().filter(|params| !params.is_empty()) {
            result["echo"] = Value::Object(params.clone());
        }
        Ok(Outcome::Result(result))
    }
}

pub struct HealthHandler {
    limiter: Arc<RateLimiter>,
    sessions: Arc<UiSessionRegistry>,
}

impl HealthHandler {
    pub fn new(limiter: Arc<RateLimiter>, sessions: Arc<UiSessionRegistry>) -> Self {
        Self { limiter, sessions }
    }
}

/// Shared by the `health` method and the plain `GET /health` route.
pub fn health_report(limiter: &RateLimiter, sessions: &UiSessionRegistry) -> Value {
    json!({
        "status": "OK",
        "rateLimiter": limiter.snapshot(),
        "uiSessions": sessions.size(),
    })
}

#[async_trait]
impl MethodHandler for HealthHandler {
    async fn handle(&self, _ctx: &RequestContext) -> Result<Outcome, McpError> {
        Ok(Outcome::Result(health_report(&self.limiter, &self.sessions)))
    }
}

pub struct StreamHandler;

#[async_trait]
impl MethodHandler for StreamHandler {
    async fn handle(&self, _ctx: &RequestContext) -> Result<Outcome, McpError> {
        Ok(Outcome::EventStream(STREAM_HANDSHAKE.to_string()))
    }
}
