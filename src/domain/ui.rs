//! UI bridge methods
//!
//! Everything except `ui/initialize` runs against an existing session, found
//! through the `X-MCP-Session-Id` header, the session id lifted from the tool
//! call params, or a plain `sessionId` param, in that order. A successful
//! lookup also counts as activity on the session.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::catalog::MethodCatalog;
use crate::domain::tools::{invoke_tool, tool_call_from_context, ToolInvoker};
use crate::errors::McpError;
use crate::mcp::server::{MethodHandler, Outcome, RequestContext, ServerInfo};
use crate::session::{
    model::{METHOD_TOOL_INPUT, METHOD_TOOL_RESULT},
    ContextOperation, UiSession, UiSessionRegistry,
};

pub const UI_CAPABILITIES: &[&str] = &[
    "tools/call",
    "ui/message",
    "ui/update-model-context",
    METHOD_TOOL_INPUT,
    METHOD_TOOL_RESULT,
];

pub fn resolve_session_id(ctx: &RequestContext) -> Option<String> {
    ctx.header_session_id
        .clone()
        .or_else(|| ctx.call.session_id.clone())
        .or_else(|| ctx.param_str("sessionId").map(str::to_string))
}

/// Resolves and touches the caller's session.
pub fn require_session(
    sessions: &UiSessionRegistry,
    ctx: &RequestContext,
) -> Result<UiSession, McpError> {
    let session_id = resolve_session_id(ctx).ok_or_else(|| {
        McpError::session(
            "Session ID is required. Provide X-MCP-Session-Id header or sessionId parameter.",
        )
    })?;

    sessions.get_and_touch(&session_id).ok_or_else(|| {
        debug!(session_id = %session_id, method = %ctx.method, "rejected unknown ui session");
        McpError::session(format!("Invalid or expired session: {session_id}"))
    })
}

pub struct UiInitializeHandler {
    sessions: Arc<UiSessionRegistry>,
    host: ServerInfo,
}

impl UiInitializeHandler {
    pub fn new(sessions: Arc<UiSessionRegistry>, host: ServerInfo) -> Self {
        Self { sessions, host }
    }
}

#[async_trait]
impl MethodHandler for UiInitializeHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Outcome, McpError> {
        let session = self.sessions.register(
            ctx.param_str("resourceUri").map(str::to_string),
            ctx.param_str("toolName").map(str::to_string),
        );

        if let Some(transport) = ctx.transport_key.clone() {
            self.sessions
                .attach_transport(&session.session_id, transport);
        }

        Ok(Outcome::Result(json!({
            "sessionId": session.session_id,
            "hostInfo": {
                "name": self.host.name,
                "version": self.host.version,
            },
            "capabilities": UI_CAPABILITIES,
        })))
    }
}

pub struct UiMessageHandler {
    sessions: Arc<UiSessionRegistry>,
}

impl UiMessageHandler {
    pub fn new(sessions: Arc<UiSessionRegistry>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl MethodHandler for UiMessageHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Outcome, McpError> {
        let session = require_session(&self.sessions, ctx)?;
        let message = ctx
            .param_str("message")
            .ok_or_else(|| McpError::invalid_params("Missing required parameter: message"))?;

        info!(
            session_id = %session.session_id,
            message_type = ctx.param_str("type").unwrap_or("text"),
            text = message,
            "ui message received"
        );

        Ok(Outcome::Result(json!({ "acknowledged": true })))
    }
}

pub struct UiUpdateModelContextHandler {
    sessions: Arc<UiSessionRegistry>,
}

impl UiUpdateModelContextHandler {
    pub fn new(sessions: Arc<UiSessionRegistry>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl MethodHandler for UiUpdateModelContextHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Outcome, McpError> {
        let session = require_session(&self.sessions, ctx)?;
        let context = ctx
            .param("context")
            .filter(|context| !context.is_null())
            .cloned()
            .ok_or_else(|| McpError::invalid_params("Missing required parameter: context"))?;
        let operation = ContextOperation::parse(ctx.param_str("operation"));

        self.sessions
            .update_model_context(&session.session_id, context, operation)
            .ok_or_else(|| {
                McpError::session(format!("Invalid or expired session: {}", session.session_id))
            })?;

        info!(
            session_id = %session.session_id,
            operation = operation.as_str(),
            "model context updated"
        );

        Ok(Outcome::Result(json!({ "updated": true })))
    }
}

pub struct UiToolsCallHandler {
    sessions: Arc<UiSessionRegistry>,
    catalog: Arc<MethodCatalog>,
    invoker: Option<Arc<dyn ToolInvoker>>,
}

impl UiToolsCallHandler {
    pub fn new(
        sessions: Arc<UiSessionRegistry>,
        catalog: Arc<MethodCatalog>,
        invoker: Option<Arc<dyn ToolInvoker>>,
    ) -> Self {
        Self {
            sessions,
            catalog,
            invoker,
        }
    }
}

#[async_trait]
impl MethodHandler for UiToolsCallHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Outcome, McpError> {
        let session = require_session(&self.sessions, ctx)?;
        let call = tool_call_from_context(ctx, Some(session.session_id.clone()))?;

        self.sessions.notify_tool_input(
            &session.session_id,
            &call.name,
            Value::Object(call.arguments.clone()),
        );

        match invoke_tool(&self.catalog, self.invoker.as_ref(), &call).await {
            Ok(result) => {
                self.sessions
                    .notify_tool_result(&session.session_id, &call.name, result.clone());
                Ok(Outcome::Result(result))
            }
            Err(err) => {
                warn!(
                    session_id = %session.session_id,
                    tool = %call.name,
                    error = %err,
                    "ui tool call failed"
                );
                self.sessions
                    .notify_tool_error(&session.session_id, &call.name, &err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::catalog::MethodDefinition;
    use crate::clock::ManualClock;
    use crate::config::SessionConfig;
    use crate::domain::system::tests::context;
    use crate::domain::tools::ToolCall;
    use crate::errors::{INVALID_PARAMS, SESSION_ERROR};
    use crate::session::{OutboundNotification, TransportKey};

    struct Doubler;

    #[async_trait]
    impl ToolInvoker for Doubler {
        async fn invoke(&self, call: &ToolCall) -> Result<Value, McpError> {
            match call.arguments.get("n").and_then(Value::as_i64) {
                Some(n) => Ok(json!({ "n": n * 2 })),
                None => Err(McpError::internal("n must be an integer")),
            }
        }
    }

    struct Fixture {
        sessions: Arc<UiSessionRegistry>,
        clock: Arc<ManualClock>,
        outbound: mpsc::UnboundedReceiver<OutboundNotification>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(10_000));
        let (sender, outbound) = mpsc::unbounded_channel();
        let sessions = Arc::new(UiSessionRegistry::with_sink(
            SessionConfig {
                timeout_ms: 1_000,
                cleanup_interval_ms: 500,
            },
            clock.clone(),
            Arc::new(sender),
        ));
        Fixture {
            sessions,
            clock,
            outbound,
        }
    }

    fn host() -> ServerInfo {
        ServerInfo {
            name: "host".to_string(),
            version: "0.1.0".to_string(),
        }
    }

    fn tools_handler(sessions: &Arc<UiSessionRegistry>) -> UiToolsCallHandler {
        UiToolsCallHandler::new(
            Arc::clone(sessions),
            Arc::new(MethodCatalog::new(vec![MethodDefinition::new("double")])),
            Some(Arc::new(Doubler)),
        )
    }

    #[tokio::test]
    async fn initialize_registers_session_and_attaches_transport() {
        let fx = fixture();
        let mut ctx = context(
            "ui/initialize",
            Some(json!({"resourceUri": "ui://chart", "toolName": "double"})),
        );
        ctx.transport_key = Some(TransportKey::new("ws-9"));

        let outcome = UiInitializeHandler::new(Arc::clone(&fx.sessions), host())
            .handle(&ctx)
            .await
            .expect("initialize");
        let Outcome::Result(body) = outcome else {
            panic!("expected result");
        };

        let session_id = body["sessionId"].as_str().expect("session id");
        let session = fx.sessions.get(session_id).expect("registered");
        assert_eq!(session.resource_uri.as_deref(), Some("ui://chart"));
        assert_eq!(session.tool_name.as_deref(), Some("double"));
        assert_eq!(session.transport, Some(TransportKey::new("ws-9")));
        assert_eq!(body["hostInfo"]["name"], "host");
        assert_eq!(body["capabilities"].as_array().map(Vec::len), Some(5));
    }

    #[tokio::test]
    async fn initialize_accepts_empty_params() {
        let fx = fixture();
        UiInitializeHandler::new(Arc::clone(&fx.sessions), host())
            .handle(&context("ui/initialize", None))
            .await
            .expect("initialize");
        assert_eq!(fx.sessions.size(), 1);
    }

    #[test]
    fn session_id_resolution_prefers_header() {
        let mut ctx = context(
            "ui/tools/call",
            Some(json!({"name": "double", "sessionId": "from-params"})),
        );
        assert_eq!(resolve_session_id(&ctx).as_deref(), Some("from-params"));

        ctx.header_session_id = Some("from-header".to_string());
        assert_eq!(resolve_session_id(&ctx).as_deref(), Some("from-header"));

        let ctx = context("ui/message", Some(json!({"sessionId": "plain"})));
        assert_eq!(resolve_session_id(&ctx).as_deref(), Some("plain"));
    }

    #[tokio::test]
    async fn message_requires_session_and_text() {
        let fx = fixture();
        let handler = UiMessageHandler::new(Arc::clone(&fx.sessions));

        let err = handler
            .handle(&context("ui/message", Some(json!({"message": "hi"}))))
            .await
            .expect_err("no session");
        assert_eq!(err.code(), SESSION_ERROR);

        let err = handler
            .handle(&context(
                "ui/message",
                Some(json!({"sessionId": "unknown", "message": "hi"})),
            ))
            .await
            .expect_err("unknown session");
        assert_eq!(err.code(), SESSION_ERROR);

        let session = fx.sessions.register(None, None);
        let err = handler
            .handle(&context(
                "ui/message",
                Some(json!({"sessionId": session.session_id, "message": "  "})),
            ))
            .await
            .expect_err("blank message");
        assert_eq!(err.code(), INVALID_PARAMS);

        let outcome = handler
            .handle(&context(
                "ui/message",
                Some(json!({"sessionId": session.session_id, "message": "hi", "type": "prompt"})),
            ))
            .await
            .expect("acknowledged");
        assert_eq!(outcome, Outcome::Result(json!({"acknowledged": true})));
    }

    #[tokio::test]
    async fn expired_session_is_rejected() {
        let fx = fixture();
        let session = fx.sessions.register(None, None);
        fx.clock.advance(1_001);

        let err = UiMessageHandler::new(Arc::clone(&fx.sessions))
            .handle(&context(
                "ui/message",
                Some(json!({"sessionId": session.session_id, "message": "hi"})),
            ))
            .await
            .expect_err("expired");
        assert_eq!(err.code(), SESSION_ERROR);
    }

    #[tokio::test]
    async fn requests_touch_the_session() {
        let fx = fixture();
        let session = fx.sessions.register(None, None);
        let handler = UiMessageHandler::new(Arc::clone(&fx.sessions));

        for _ in 0..3 {
            fx.clock.advance(800);
            handler
                .handle(&context(
                    "ui/message",
                    Some(json!({"sessionId": session.session_id, "message": "still here"})),
                ))
                .await
                .expect("live session");
        }
        assert!(fx.sessions.exists(&session.session_id));
    }

    #[tokio::test]
    async fn update_model_context_replaces_and_merges() {
        let fx = fixture();
        let session = fx.sessions.register(None, None);
        let handler = UiUpdateModelContextHandler::new(Arc::clone(&fx.sessions));

        let err = handler
            .handle(&context(
                "ui/update-model-context",
                Some(json!({"sessionId": session.session_id, "context": null})),
            ))
            .await
            .expect_err("context required");
        assert_eq!(err.code(), INVALID_PARAMS);

        handler
            .handle(&context(
                "ui/update-model-context",
                Some(json!({"sessionId": session.session_id, "context": {"a": 1}})),
            ))
            .await
            .expect("replace");
        let outcome = handler
            .handle(&context(
                "ui/update-model-context",
                Some(json!({
                    "sessionId": session.session_id,
                    "context": {"b": 2},
                    "operation": "Merge"
                })),
            ))
            .await
            .expect("merge");
        assert_eq!(outcome, Outcome::Result(json!({"updated": true})));

        let stored = fx
            .sessions
            .get(&session.session_id)
            .and_then(|session| session.model_context);
        assert_eq!(stored, Some(json!({"a": 1, "b": 2})));
    }

    #[tokio::test]
    async fn tools_call_notifies_input_then_result() {
        let mut fx = fixture();
        let session = fx.sessions.register(None, None);
        fx.sessions
            .attach_transport(&session.session_id, TransportKey::new("ws-1"));

        let outcome = tools_handler(&fx.sessions)
            .handle(&context(
                "ui/tools/call",
                Some(json!({
                    "name": "double",
                    "sessionId": session.session_id,
                    "arguments": {"n": 21}
                })),
            ))
            .await
            .expect("call");
        assert_eq!(outcome, Outcome::Result(json!({"n": 42})));

        let input = fx.outbound.try_recv().expect("input notification");
        assert_eq!(input.notification.method, METHOD_TOOL_INPUT);
        assert_eq!(input.notification.params["arguments"]["n"], 21);

        let result = fx.outbound.try_recv().expect("result notification");
        assert_eq!(result.notification.method, METHOD_TOOL_RESULT);
        assert_eq!(result.notification.params["result"]["n"], 42);
        assert_eq!(result.session_id, session.session_id);
    }

    #[tokio::test]
    async fn tools_call_failure_notifies_error() {
        let mut fx = fixture();
        let session = fx.sessions.register(None, None);
        fx.sessions
            .attach_transport(&session.session_id, TransportKey::new("ws-1"));

        let err = tools_handler(&fx.sessions)
            .handle(&context(
                "ui/tools/call",
                Some(json!({"name": "double", "sessionId": session.session_id})),
            ))
            .await
            .expect_err("invoker failure");
        assert_eq!(err.to_string(), "n must be an integer");

        let _input = fx.outbound.try_recv().expect("input notification");
        let error = fx.outbound.try_recv().expect("error notification");
        assert_eq!(error.notification.params["error"], "n must be an integer");
    }

    #[tokio::test]
    async fn tools_call_without_session_never_invokes() {
        let mut fx = fixture();
        let err = tools_handler(&fx.sessions)
            .handle(&context("ui/tools/call", Some(json!({"name": "double"}))))
            .await
            .expect_err("session required");
        assert_eq!(err.code(), SESSION_ERROR);
        assert!(fx.outbound.try_recv().is_err());
    }
}
