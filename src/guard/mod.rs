//! Pre-dispatch guard pipeline
//!
//! Stages run in a fixed order and the first rejection aborts the call. Every
//! stage fails with an [`AppError`], which the transport maps to a status code
//! rather than a JSON-RPC envelope.

pub mod headers;
pub mod rate_limit;
pub mod size;

use std::sync::Arc;

use axum::{body::Bytes, http::HeaderMap};
use tracing::debug;

use crate::errors::AppError;
use crate::session::model::TransportKey;

pub use headers::{HeaderValidator, DEFAULT_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS};
pub use rate_limit::{RateLimitGuard, RateLimiter, RateLimiterSnapshot};
pub use size::SizeGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    WebSocket,
}

/// One inbound call as handed over by the transport collaborator.
#[derive(Debug, Clone)]
pub struct InboundCall {
    pub transport: TransportKind,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Connection handle owned by the transport, used to route UI notifications.
    pub transport_key: Option<TransportKey>,
    pub protocol_version: Option<String>,
    pub tokens_remaining: Option<u32>,
}

impl InboundCall {
    pub fn http(headers: HeaderMap, body: Bytes) -> Self {
        Self {
            transport: TransportKind::Http,
            headers,
            body: Some(body),
            transport_key: None,
            protocol_version: None,
            tokens_remaining: None,
        }
    }

    pub fn websocket(transport_key: TransportKey, body: Bytes) -> Self {
        Self {
            transport: TransportKind::WebSocket,
            headers: HeaderMap::new(),
            body: Some(body),
            transport_key: Some(transport_key),
            protocol_version: None,
            tokens_remaining: None,
        }
    }

    pub fn protocol_version(&self) -> &str {
        self.protocol_version
            .as_deref()
            .unwrap_or(DEFAULT_PROTOCOL_VERSION)
    }
}

pub trait GuardStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, call: &mut InboundCall) -> Result<(), AppError>;
}

pub struct GuardPipeline {
    stages: Vec<Box<dyn GuardStage>>,
}

impl GuardPipeline {
    pub fn new(stages: Vec<Box<dyn GuardStage>>) -> Self {
        Self { stages }
    }

    /// Size guard, header validator, then rate limiter.
    pub fn standard(size: SizeGuard, limiter: Arc<RateLimiter>) -> Self {
        Self::new(vec![
            Box::new(size),
            Box::new(HeaderValidator),
            Box::new(RateLimitGuard::new(limiter)),
        ])
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn run(&self, call: &mut InboundCall) -> Result<(), AppError> {
        for stage in &self.stages {
            if let Err(err) = stage.check(call) {
                debug!(stage = stage.name(), error = %err, "guard rejected call");
                return Err(err);
            }
        }
        Ok(())
    }
}
