//! MCP (Model Context Protocol) client library.
//!
//! This crate provides a client for communicating with MCP servers over the
//! SSE transport: server messages arrive on a `text/event-stream` held open
//! at `<url>/sse`, client messages are POSTed to the endpoint the server
//! announces first.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Client, ClientConfig};
//!
//! # async fn example() -> mcp::Result<()> {
//! let client = Client::connect(ClientConfig::new("http://localhost:8000")).await?;
//!
//! for tool in client.tools().await {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let result = client.call_tool("get_price", Some(serde_json::json!({
//!     "ids": "bitcoin",
//!     "vs_currencies": "usd,eur"
//! }))).await?;
//! println!("{}", result.text());
//!
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod protocol;
pub mod sse;

pub use client::{Client, ClientConfig, SSE_PATH};
pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, GetPromptParams, GetPromptResult, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListPromptsResult,
    ListToolsResult, PROTOCOL_VERSION, Prompt, PromptArgument, PromptMessage, RequestId,
    ResourceContents, ServerCapabilities, ServerInfo, Tool, ToolContent,
};
pub use sse::{MAX_EVENT_SIZE, SseEvent};
