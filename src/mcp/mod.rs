//! Model Context Protocol (MCP) engine and JSON-RPC plumbing
//!
//! Envelope classification and routing, response assembly, and the engine that
//! ties the guard pipeline to the method handlers.

pub mod envelope;
pub mod rpc;
pub mod server;

pub use server::{Dispatch, McpEngine, McpEngineBuilder, Reply};
