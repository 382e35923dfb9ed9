//! The central Model Context Protocol engine
//!
//! Runs the guard pipeline, classifies the envelope, routes the method through
//! the dispatch table and wraps whatever the handler produced into a reply the
//! transport can send as-is.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::catalog::{MethodCatalog, ResourceCatalog};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::domain::{
    notifications::NotificationHandler,
    resources::{
        EmptyGetProvider, InlineContentProvider, ResourceContentProvider, ResourceGetProvider,
        ResourcesGetHandler, ResourcesListHandler, ResourcesReadHandler,
    },
    system::{HealthHandler, InitializeHandler, PingHandler, StreamHandler},
    tools::{ToolInvoker, ToolsCallHandler, ToolsListHandler},
    ui::{UiInitializeHandler, UiMessageHandler, UiToolsCallHandler, UiUpdateModelContextHandler},
};
use crate::errors::{AppError, McpError};
use crate::guard::{GuardPipeline, InboundCall, RateLimiter, SizeGuard, DEFAULT_PROTOCOL_VERSION};
use crate::mcp::envelope::{
    classify, extract_call_params, resolve_route, CallParams, Message, Route,
    NOTIFICATION_FAMILY_KEY, UI_NOTIFICATION_FAMILY_KEY,
};
use crate::mcp::rpc::{json_rpc_result, mcp_error_to_json_rpc};
use crate::session::{NotificationSink, TracingSink, TransportKey, UiSessionRegistry};

pub const SESSION_ID_HEADER: &str = "x-mcp-session-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Everything a handler may look at for one call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: String,
    pub route: Route,
    pub params: Option<Value>,
    pub call: CallParams,
    pub header_session_id: Option<String>,
    pub protocol_version: String,
    pub transport_key: Option<TransportKey>,
}

impl RequestContext {
    pub fn params_object(&self) -> Option<&Map<String, Value>> {
        self.params.as_ref().and_then(Value::as_object)
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params_object().and_then(|params| params.get(key))
    }

    /// Trimmed string parameter, `None` when absent or blank.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Result(Value),
    EventStream(String),
    Acknowledged,
}

#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(&self, ctx: &RequestContext) -> Result<Outcome, McpError>;
}

#[derive(Default)]
pub struct DispatchTable {
    handlers: HashMap<&'static str, Arc<dyn MethodHandler>>,
}

impl DispatchTable {
    pub fn insert<H>(&mut self, key: &'static str, handler: H)
    where
        H: MethodHandler + 'static,
    {
        self.handlers.insert(key, Arc::new(handler));
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn MethodHandler>> {
        self.handlers.get(key)
    }

    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.handlers.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

/// What the transport should send back.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Envelope(Value),
    NoContent,
    EventStream(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub protocol_version: String,
    pub reply: Reply,
}

#[derive(Debug, Clone, Default)]
struct CallMeta {
    protocol_version: Option<String>,
    header_session_id: Option<String>,
    transport_key: Option<TransportKey>,
}

impl CallMeta {
    fn from_call(call: &InboundCall) -> Self {
        Self {
            protocol_version: call.protocol_version.clone(),
            header_session_id: session_header(&call.headers),
            transport_key: call.transport_key.clone(),
        }
    }
}

fn session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub struct McpEngine {
    pipeline: GuardPipeline,
    dispatch: DispatchTable,
    limiter: Arc<RateLimiter>,
    sessions: Arc<UiSessionRegistry>,
    server: ServerInfo,
}

impl McpEngine {
    pub fn builder(config: &Config) -> McpEngineBuilder {
        McpEngineBuilder::new(config)
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn sessions(&self) -> &Arc<UiSessionRegistry> {
        &self.sessions
    }

    pub fn routes(&self) -> Vec<&'static str> {
        self.dispatch.keys()
    }

    pub fn guard_stages(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }

    /// Full inbound path: guards first, then the JSON-RPC engine.
    pub async fn process(&self, mut call: InboundCall) -> Result<Dispatch, AppError> {
        self.pipeline.run(&mut call)?;

        let meta = CallMeta::from_call(&call);
        let protocol_version = call.protocol_version().to_string();
        let body = call.body.take().unwrap_or_default();

        let reply = match serde_json::from_slice::<Value>(&body) {
            Ok(payload) => self.dispatch_payload(payload, &meta).await,
            Err(err) => {
                debug!(error = %err, "request body is not valid json");
                Reply::Envelope(mcp_error_to_json_rpc(None, &McpError::Parse))
            }
        };

        Ok(Dispatch {
            protocol_version,
            reply,
        })
    }

    /// Handles an already decoded payload without running the guards.
    pub async fn handle(&self, payload: Value) -> Reply {
        self.dispatch_payload(payload, &CallMeta::default()).await
    }

    async fn dispatch_payload(&self, payload: Value, meta: &CallMeta) -> Reply {
        let message = match classify(&payload) {
            Ok(message) => message,
            Err(err) => {
                let id = payload
                    .get("id")
                    .filter(|id| id.is_string() || id.is_number());
                return Reply::Envelope(mcp_error_to_json_rpc(id, &err));
            }
        };

        match message {
            Message::Response { id } => {
                debug!(id = ?id, "client response acknowledged");
                Reply::NoContent
            }
            Message::Notification { method, params } => {
                if let Err(err) = self.execute(None, method.clone(), params, meta).await {
                    debug!(method = %method, error = %err, "notification handling failed");
                }
                Reply::NoContent
            }
            Message::Request { id, method, params } => {
                match self.execute(Some(id.clone()), method, params, meta).await {
                    Ok(Outcome::Result(result)) => Reply::Envelope(json_rpc_result(&id, result)),
                    Ok(Outcome::EventStream(body)) => Reply::EventStream(body),
                    Ok(Outcome::Acknowledged) => Reply::NoContent,
                    Err(err) => Reply::Envelope(mcp_error_to_json_rpc(Some(&id), &err)),
                }
            }
        }
    }

    async fn execute(
        &self,
        id: Option<Value>,
        method: String,
        params: Option<Value>,
        meta: &CallMeta,
    ) -> Result<Outcome, McpError> {
        let audit_params = redact_audit_params(params.as_ref());
        let outcome = self.route_and_run(&method, params, meta).await;

        info!(
            method = %method,
            id = ?id,
            params = %audit_params,
            outcome = if outcome.is_ok() { "success" } else { "failure" },
            "mcp action audited"
        );

        outcome
    }

    async fn route_and_run(
        &self,
        method: &str,
        params: Option<Value>,
        meta: &CallMeta,
    ) -> Result<Outcome, McpError> {
        let route = resolve_route(method)?;
        let call = extract_call_params(&route, params.as_ref())?;
        let handler = self
            .dispatch
            .get(route.key)
            .ok_or_else(|| McpError::method_not_found(method))?;

        let ctx = RequestContext {
            method: method.to_string(),
            route,
            params,
            call,
            header_session_id: meta.header_session_id.clone(),
            protocol_version: meta
                .protocol_version
                .clone()
                .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            transport_key: meta.transport_key.clone(),
        };

        handler.handle(&ctx).await
    }

    pub fn start(&self) {
        self.sessions.start();
    }

    pub fn stop(&self) {
        self.sessions.stop();
    }
}

pub struct McpEngineBuilder {
    config: Config,
    methods: MethodCatalog,
    resources: ResourceCatalog,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    tool_invoker: Option<Arc<dyn ToolInvoker>>,
    content_provider: Arc<dyn ResourceContentProvider>,
    get_provider: Arc<dyn ResourceGetProvider>,
}

impl McpEngineBuilder {
    fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            methods: MethodCatalog::default(),
            resources: ResourceCatalog::default(),
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
            tool_invoker: None,
            content_provider: Arc::new(InlineContentProvider),
            get_provider: Arc::new(EmptyGetProvider),
        }
    }

    pub fn methods(mut self, methods: MethodCatalog) -> Self {
        self.methods = methods;
        self
    }

    pub fn resources(mut self, resources: ResourceCatalog) -> Self {
        self.resources = resources;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn tool_invoker(mut self, invoker: Arc<dyn ToolInvoker>) -> Self {
        self.tool_invoker = Some(invoker);
        self
    }

    pub fn content_provider(mut self, provider: Arc<dyn ResourceContentProvider>) -> Self {
        self.content_provider = provider;
        self
    }

    pub fn get_provider(mut self, provider: Arc<dyn ResourceGetProvider>) -> Self {
        self.get_provider = provider;
        self
    }

    pub fn build(self) -> McpEngine {
        let server = ServerInfo {
            name: self.config.server_name.clone(),
            version: self.config.server_version.clone(),
        };
        let limiter = Arc::new(RateLimiter::new(
            self.config.rate_limit,
            Arc::clone(&self.clock),
        ));
        let sessions = Arc::new(UiSessionRegistry::with_sink(
            self.config.sessions,
            Arc::clone(&self.clock),
            self.sink,
        ));
        let pipeline = GuardPipeline::standard(
            SizeGuard::new(self.config.size_guard),
            Arc::clone(&limiter),
        );
        let methods = Arc::new(self.methods);
        let resources = Arc::new(self.resources);

        let mut dispatch = DispatchTable::default();
        dispatch.insert("initialize", InitializeHandler::new(server.clone()));
        dispatch.insert("ping", PingHandler::new(Arc::clone(&self.clock)));
        dispatch.insert(
            "health",
            HealthHandler::new(Arc::clone(&limiter), Arc::clone(&sessions)),
        );
        dispatch.insert("stream", StreamHandler);
        dispatch.insert("tools/list", ToolsListHandler::new(Arc::clone(&methods)));
        dispatch.insert(
            "tools/call",
            ToolsCallHandler::new(Arc::clone(&methods), self.tool_invoker.clone()),
        );
        dispatch.insert(
            "resources/list",
            ResourcesListHandler::new(Arc::clone(&resources)),
        );
        dispatch.insert(
            "resources/read",
            ResourcesReadHandler::new(Arc::clone(&resources), self.content_provider),
        );
        dispatch.insert("resources/get", ResourcesGetHandler::new(self.get_provider));
        dispatch.insert(
            "ui/initialize",
            UiInitializeHandler::new(Arc::clone(&sessions), server.clone()),
        );
        dispatch.insert("ui/message", UiMessageHandler::new(Arc::clone(&sessions)));
        dispatch.insert(
            "ui/update-model-context",
            UiUpdateModelContextHandler::new(Arc::clone(&sessions)),
        );
        dispatch.insert(
            "ui/tools/call",
            UiToolsCallHandler::new(Arc::clone(&sessions), methods, self.tool_invoker),
        );
        dispatch.insert(NOTIFICATION_FAMILY_KEY, NotificationHandler);
        dispatch.insert(UI_NOTIFICATION_FAMILY_KEY, NotificationHandler);

        McpEngine {
            pipeline,
            dispatch,
            limiter,
            sessions,
            server,
        }
    }
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "credentials" | "credential" | "api_key" | "apikey"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}
