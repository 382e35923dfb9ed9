//! JSON-RPC response envelopes
//!
//! Maps [`McpError`] faults and handler results onto JSON-RPC 2.0 payloads.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde_json::{json, Value};

use crate::errors::McpError;

pub fn mcp_error_to_json_rpc(id: Option<&Value>, err: &McpError) -> Value {
    json_rpc_error_with_data(id, err.code(), &err.to_string(), err.data().cloned())
}

pub fn json_rpc_error_with_data(
    id: Option<&Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let fallback = json!({
        "jsonrpc": "2.0",
        "id": id.cloned().unwrap_or(Value::Null),
        "error": {
            "code": code,
            "message": message,
            "data": data.clone(),
        }
    });
    let request_id = match id.map(value_to_request_id) {
        Some(None) => return fallback,
        Some(request_id) => request_id,
        None => None,
    };
    let response = JsonrpcErrorResponse::new(
        RpcError {
            code: i64::from(code),
            data,
            message: message.to_string(),
        },
        request_id,
    );

    serde_json::to_value(response).unwrap_or(fallback)
}

pub fn json_rpc_result(id: &Value, result: Value) -> Value {
    if let (Some(request_id), Value::Object(extra)) = (value_to_request_id(id), &result) {
        let response = JsonrpcResultResponse::new(
            request_id,
            McpResult {
                meta: None,
                extra: Some(extra.clone()),
            },
        );
        if let Ok(value) = serde_json::to_value(response) {
            return value;
        }
    }

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}
