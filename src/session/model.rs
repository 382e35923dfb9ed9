use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

pub const METHOD_TOOL_INPUT: &str = "ui/notifications/tool-input";
pub const METHOD_TOOL_RESULT: &str = "ui/notifications/tool-result";

/// Lookup key for a connection owned by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TransportKey(String);

impl TransportKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiSession {
    pub session_id: String,
    pub resource_uri: Option<String>,
    pub tool_name: Option<String>,
    pub created_at_ms: u64,
    pub last_activity_ms: u64,
    pub model_context: Option<Value>,
    pub transport: Option<TransportKey>,
}

impl UiSession {
    pub(crate) fn new(
        session_id: String,
        resource_uri: Option<String>,
        tool_name: Option<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            session_id,
            resource_uri,
            tool_name,
            created_at_ms: now_ms,
            last_activity_ms: now_ms,
            model_context: None,
            transport: None,
        }
    }

    pub fn idle_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_activity_ms)
    }

    pub fn is_expired(&self, now_ms: u64, timeout_ms: u64) -> bool {
        self.idle_ms(now_ms) > timeout_ms
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.created_at_ms)
    }
}

fn millis_to_utc(millis: u64) -> Option<DateTime<Utc>> {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOperation {
    Replace,
    Merge,
}

impl ContextOperation {
    pub fn parse(operation: Option<&str>) -> Self {
        match operation {
            Some(operation) if operation.trim().eq_ignore_ascii_case("merge") => Self::Merge,
            _ => Self::Replace,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Merge => "merge",
        }
    }
}

/// One-way JSON-RPC notification pushed from the host to an embedded UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiNotification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
}

impl UiNotification {
    pub fn tool_input(tool_name: &str, arguments: Value) -> Self {
        Self::new(
            METHOD_TOOL_INPUT,
            json!({ "toolName": tool_name, "arguments": arguments }),
        )
    }

    pub fn tool_result(tool_name: &str, result: Value) -> Self {
        Self::new(
            METHOD_TOOL_RESULT,
            json!({ "toolName": tool_name, "result": result }),
        )
    }

    pub fn tool_error(tool_name: &str, error: &str) -> Self {
        Self::new(
            METHOD_TOOL_RESULT,
            json!({ "toolName": tool_name, "error": error }),
        )
    }

    fn new(method: &'static str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}
