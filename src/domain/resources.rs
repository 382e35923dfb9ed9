//! Resource listing, reading and lookup
//!
//! Resource bodies come from an injected [`ResourceContentProvider`]. The default
//! provider serves `inline:<text>` sources straight from the catalog entry.

use std::sync::Arc;

use async_trait::async_trait;
use rust_mcp_sdk::schema::{ReadResourceContent, ReadResourceResult, TextResourceContents};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::error;

use crate::catalog::{ResourceCatalog, ResourceDefinition};
use crate::errors::McpError;
use crate::mcp::server::{MethodHandler, Outcome, RequestContext};

pub const INLINE_SOURCE_PREFIX: &str = "inline:";
pub const DEFAULT_MIME_TYPE: &str = "text/plain";

#[derive(Debug, Error)]
pub enum ResourceLoadError {
    #[error("resource source is not defined for {uri}")]
    MissingSource { uri: String },
    #[error("unknown source type: {declared}")]
    UnsupportedSource { declared: String },
}

pub trait ResourceContentProvider: Send + Sync {
    fn load(&self, resource: &ResourceDefinition) -> Result<String, ResourceLoadError>;
}

#[derive(Debug, Default)]
pub struct InlineContentProvider;

impl ResourceContentProvider for InlineContentProvider {
    fn load(&self, resource: &ResourceDefinition) -> Result<String, ResourceLoadError> {
        let source = resource
            .source
            .as_deref()
            .map(str::trim)
            .filter(|source| !source.is_empty())
            .ok_or_else(|| ResourceLoadError::MissingSource {
                uri: resource.uri.clone(),
            })?;

        source
            .strip_prefix(INLINE_SOURCE_PREFIX)
            .map(str::to_string)
            .ok_or_else(|| ResourceLoadError::UnsupportedSource {
                declared: source.to_string(),
            })
    }
}

/// Backs `resources/get`, which looks resources up by free-form name.
pub trait ResourceGetProvider: Send + Sync {
    fn get(&self, resource: &str, params: &Map<String, Value>) -> Result<Value, McpError>;
}

#[derive(Debug, Default)]
pub struct EmptyGetProvider;

impl ResourceGetProvider for EmptyGetProvider {
    fn get(&self, _resource: &str, _params: &Map<String, Value>) -> Result<Value, McpError> {
        Ok(Value::Object(Map::new()))
    }
}

pub struct ResourcesListHandler {
    catalog: Arc<ResourceCatalog>,
}

impl ResourcesListHandler {
    pub fn new(catalog: Arc<ResourceCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl MethodHandler for ResourcesListHandler {
    async fn handle(&self, _ctx: &RequestContext) -> Result<Outcome, McpError> {
        let resources: Vec<Value> = self
            .catalog
            .list()
            .iter()
            .map(ResourceDefinition::to_resource_entry)
            .collect();
        Ok(Outcome::Result(json!({ "resources": resources })))
    }
}

pub struct ResourcesReadHandler {
    catalog: Arc<ResourceCatalog>,
    provider: Arc<dyn ResourceContentProvider>,
}

impl ResourcesReadHandler {
    pub fn new(catalog: Arc<ResourceCatalog>, provider: Arc<dyn ResourceContentProvider>) -> Self {
        Self { catalog, provider }
    }
}

#[async_trait]
impl MethodHandler for ResourcesReadHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Outcome, McpError> {
        let uri = ctx
            .param_str("uri")
            .ok_or_else(|| McpError::invalid_params("Missing required parameter: uri"))?;
        let resource = self
            .catalog
            .find_by_uri(uri)
            .ok_or_else(|| McpError::invalid_params(format!("Resource not found: {uri}")))?;

        let text = self.provider.load(resource).map_err(|err| {
            error!(uri, error = %err, "failed to load resource");
            McpError::internal(format!("Failed to load resource: {err}"))
        })?;

        let result = serde_json::to_value(ReadResourceResult {
            contents: vec![ReadResourceContent::from(TextResourceContents {
                meta: None,
                mime_type: Some(
                    resource
                        .mime_type
                        .clone()
                        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
                ),
                text,
                uri: resource.uri.clone(),
            })],
            meta: None,
        })
        .map_err(|err| McpError::internal(format!("read resource result serialization: {err}")))?;

        Ok(Outcome::Result(result))
    }
}

pub struct ResourcesGetHandler {
    provider: Arc<dyn ResourceGetProvider>,
}

impl ResourcesGetHandler {
    pub fn new(provider: Arc<dyn ResourceGetProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl MethodHandler for ResourcesGetHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Outcome, McpError> {
        let resource = match ctx.param("resource") {
            None | Some(Value::Null) => {
                return Err(McpError::invalid_params(
                    "Invalid params: 'resource' parameter is required",
                ))
            }
            Some(Value::String(name)) => name.trim().to_string(),
            Some(other) => other.to_string(),
        };
        if resource.is_empty() {
            return Err(McpError::invalid_params(
                "Invalid params: 'resource' parameter must not be blank",
            ));
        }

        let empty = Map::new();
        let params = ctx.params_object().unwrap_or(&empty);
        Ok(Outcome::Result(self.provider.get(&resource, params)?))
    }
}
