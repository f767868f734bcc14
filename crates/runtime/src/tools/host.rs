//! Tool host trait.

use crate::model::{ToolCall, ToolSpec};
use crate::tools::ToolError;
use serde_json::Value;
use std::future::Future;

/// Trait for tool execution hosts.
///
/// Implementations provide tool specifications and execute tool calls.
/// This is the boundary between the conversation loop and the tool server.
pub trait ToolHost: Send + Sync {
    /// Tool descriptors, fixed for the lifetime of the host.
    fn specs(&self) -> &[ToolSpec];

    /// Execute a tool call, returning the server's raw result payload.
    fn execute(&self, call: &ToolCall) -> impl Future<Output = Result<Value, ToolError>> + Send;
}
