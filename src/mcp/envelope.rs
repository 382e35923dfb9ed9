//! JSON-RPC envelope classification and method routing

use serde_json::{Map, Value};

use crate::errors::McpError;

pub const JSONRPC_VERSION: &str = "2.0";

pub const NOTIFICATION_PREFIX: &str = "notifications/";
pub const UI_NOTIFICATION_PREFIX: &str = "ui/notifications/";

/// Dispatch keys shared by every method of a prefix family.
pub const NOTIFICATION_FAMILY_KEY: &str = "notifications/*";
pub const UI_NOTIFICATION_FAMILY_KEY: &str = "ui/notifications/*";

pub const EXACT_METHODS: &[&str] = &[
    "initialize",
    "ping",
    "tools/list",
    "tools/call",
    "resources/list",
    "resources/read",
    "resources/get",
    "health",
    "stream",
    "ui/initialize",
    "ui/message",
    "ui/update-model-context",
    "ui/tools/call",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response {
        id: Option<Value>,
    },
}

impl Message {
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            Self::Response { .. } => None,
        }
    }

    pub fn id(&self) -> Option<&Value> {
        match self {
            Self::Request { id, .. } => Some(id),
            Self::Response { id } => id.as_ref(),
            Self::Notification { .. } => None,
        }
    }
}

/// Splits a decoded payload into a request, a notification or a client response.
pub fn classify(payload: &Value) -> Result<Message, McpError> {
    let object = payload
        .as_object()
        .ok_or_else(|| McpError::invalid_request("Invalid Request"))?;

    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(McpError::invalid_request("Invalid JSON-RPC version"));
    }

    let id = object.get("id").filter(|id| !id.is_null()).cloned();
    if let Some(id) = &id {
        if !(id.is_string() || id.is_number()) {
            return Err(McpError::invalid_request("Invalid Request id"));
        }
    }

    let Some(method) = object.get("method") else {
        if object.contains_key("result") || object.contains_key("error") {
            return Ok(Message::Response { id });
        }
        return Err(McpError::invalid_request("Invalid Request"));
    };

    let method = method
        .as_str()
        .map(str::trim)
        .filter(|method| !method.is_empty())
        .ok_or_else(|| McpError::invalid_request("Invalid Request method"))?
        .to_string();
    let params = object.get("params").filter(|params| !params.is_null()).cloned();

    Ok(match id {
        Some(id) => Message::Request { id, method, params },
        None => Message::Notification { method, params },
    })
}

/// Where a method lands in the dispatch table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub key: &'static str,
    /// Trailing segment for `notifications/<type>` style methods.
    pub notification_type: Option<String>,
}

pub fn resolve_route(method: &str) -> Result<Route, McpError> {
    if let Some(key) = EXACT_METHODS.iter().copied().find(|known| *known == method) {
        return Ok(Route {
            key,
            notification_type: None,
        });
    }

    let family = [
        (UI_NOTIFICATION_PREFIX, UI_NOTIFICATION_FAMILY_KEY),
        (NOTIFICATION_PREFIX, NOTIFICATION_FAMILY_KEY),
    ]
    .into_iter()
    .find_map(|(prefix, key)| {
        method
            .strip_prefix(prefix)
            .filter(|kind| !kind.trim().is_empty())
            .map(|kind| (key, kind.to_string()))
    });

    match family {
        Some((key, kind)) => Ok(Route {
            key,
            notification_type: Some(kind),
        }),
        None => Err(McpError::method_not_found(method)),
    }
}

/// Routing metadata lifted out of `params` before a handler sees them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallParams {
    pub tool_name: Option<String>,
    pub arguments: Map<String, Value>,
    pub session_id: Option<String>,
}

/// Extracts tool name, arguments and session id for the tool call methods.
/// Other methods get an empty value.
pub fn extract_call_params(route: &Route, params: Option<&Value>) -> Result<CallParams, McpError> {
    let tool_call = matches!(route.key, "tools/call" | "ui/tools/call");
    if !tool_call {
        return Ok(CallParams::default());
    }

    let params = params.and_then(Value::as_object);
    let tool_name = params
        .and_then(|params| params.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| McpError::invalid_params("Missing required parameter: name"))?
        .to_string();

    let arguments = match params.and_then(|params| params.get("arguments")) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(arguments)) => arguments.clone(),
        Some(_) => return Err(McpError::invalid_params("arguments must be an object")),
    };

    let session_id = if route.key == "ui/tools/call" {
        params
            .and_then(|params| params.get("sessionId"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|session_id| !session_id.is_empty())
            .map(str::to_string)
    } else {
        None
    };

    Ok(CallParams {
        tool_name: Some(tool_name),
        arguments,
        session_id,
    })
}
