use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const SESSION_ERROR: i32 = -32001;

/// Rejections raised by the guard pipeline before any JSON-RPC id is known.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("request body too large ({length} bytes, max {max})")]
    PayloadTooLarge { length: usize, max: usize },
    #[error("invalid headers: {message}")]
    InvalidHeaders {
        code: &'static str,
        message: &'static str,
    },
    #[error("rate limit exceeded: no tokens available (capacity {capacity})")]
    RateLimited { capacity: u32 },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn invalid_headers(code: &'static str, message: &'static str) -> Self {
        Self::InvalidHeaders { code, message }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidHeaders { .. } => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, details) = match &self {
            Self::PayloadTooLarge { length, max } => (
                "payload_too_large",
                self.to_string(),
                json!({ "length": length, "max": max }),
            ),
            Self::InvalidHeaders { code, message } => (*code, message.to_string(), json!({})),
            Self::RateLimited { capacity } => (
                "rate_limited",
                self.to_string(),
                json!({ "capacity": capacity }),
            ),
            Self::Internal { code, message } => {
                tracing::error!(error = %message, "request failed with internal error");
                (*code, "internal server error".to_string(), json!({}))
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details,
            }),
        )
            .into_response()
    }
}

/// In-protocol faults, rendered as JSON-RPC error envelopes.
#[derive(Debug, Clone, Error)]
pub enum McpError {
    #[error("Parse error")]
    Parse,
    #[error("{message}")]
    InvalidRequest { message: String },
    #[error("Method not found: {method}")]
    MethodNotFound { method: String },
    #[error("{message}")]
    InvalidParams {
        message: String,
        data: Option<Value>,
    },
    #[error("{message}")]
    Internal { message: String },
    #[error("{message}")]
    Session { message: String },
}

impl McpError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
            data: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    pub fn with_data(self, data: Value) -> Self {
        match self {
            Self::InvalidParams { message, .. } => Self::InvalidParams {
                message,
                data: Some(data),
            },
            other => other,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Parse => PARSE_ERROR,
            Self::InvalidRequest { .. } => INVALID_REQUEST,
            Self::MethodNotFound { .. } => METHOD_NOT_FOUND,
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::Internal { .. } => INTERNAL_ERROR,
            Self::Session { .. } => SESSION_ERROR,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::InvalidParams { data, .. } => data.as_ref(),
            _ => None,
        }
    }
}
