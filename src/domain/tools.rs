//! Tool listing and invocation
//!
//! The engine knows tools only through the method catalog. Running one is
//! delegated to an injected [`ToolInvoker`], which owns the business logic.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::catalog::{MethodCatalog, MethodDefinition};
use crate::errors::McpError;
use crate::mcp::server::{MethodHandler, Outcome, RequestContext};

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
    /// Set when the call came in through `ui/tools/call`.
    pub session_id: Option<String>,
}

#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, call: &ToolCall) -> Result<Value, McpError>;
}

/// Looks the tool up, checks required arguments and hands it to the invoker.
pub async fn invoke_tool(
    catalog: &MethodCatalog,
    invoker: Option<&Arc<dyn ToolInvoker>>,
    call: &ToolCall,
) -> Result<Value, McpError> {
    let definition = catalog
        .find_by_name(&call.name)
        .ok_or_else(|| McpError::invalid_params(format!("Unknown tool: {}", call.name)))?;
    check_required_arguments(definition, &call.arguments)?;

    let invoker = invoker.ok_or_else(|| {
        McpError::internal(format!("No tool invoker configured for {}", call.name))
    })?;

    debug!(tool = %call.name, session_id = ?call.session_id, "invoking tool");
    invoker.invoke(call).await
}

fn check_required_arguments(
    definition: &MethodDefinition,
    arguments: &Map<String, Value>,
) -> Result<(), McpError> {
    let missing: Vec<&str> = definition
        .required_arguments()
        .into_iter()
        .filter(|name| arguments.get(*name).map_or(true, Value::is_null))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    Err(
        McpError::invalid_params(format!("Missing required arguments for {}", definition.name))
            .with_data(json!({ "missing": missing })),
    )
}

/// Builds a [`ToolCall`] from the routing metadata the classifier lifted out of params.
pub fn tool_call_from_context(
    ctx: &RequestContext,
    session_id: Option<String>,
) -> Result<ToolCall, McpError> {
    let name = ctx
        .call
        .tool_name
        .clone()
        .ok_or_else(|| McpError::invalid_params("Missing required parameter: name"))?;

    Ok(ToolCall {
        name,
        arguments: ctx.call.arguments.clone(),
        session_id,
    })
}

pub struct ToolsListHandler {
    catalog: Arc<MethodCatalog>,
}

impl ToolsListHandler {
    pub fn new(catalog: Arc<MethodCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl MethodHandler for ToolsListHandler {
    async fn handle(&self, _ctx: &RequestContext) -> Result<Outcome, McpError> {
        let tools: Vec<Value> = self
            .catalog
            .list()
            .iter()
            .map(MethodDefinition::to_tool_entry)
            .collect();
        Ok(Outcome::Result(json!({ "tools": tools })))
    }
}

pub struct ToolsCallHandler {
    catalog: Arc<MethodCatalog>,
    invoker: Option<Arc<dyn ToolInvoker>>,
}

impl ToolsCallHandler {
    pub fn new(catalog: Arc<MethodCatalog>, invoker: Option<Arc<dyn ToolInvoker>>) -> Self {
        Self { catalog, invoker }
    }
}

#[async_trait]
impl MethodHandler for ToolsCallHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Outcome, McpError> {
        let call = tool_call_from_context(ctx, None)?;
        let result = invoke_tool(&self.catalog, self.invoker.as_ref(), &call).await?;
        Ok(Outcome::Result(result))
    }
}
