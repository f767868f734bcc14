//! MCP error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to connect to MCP server: {0}")]
    Connection(String),

    #[error("invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server closed the event stream")]
    Disconnected,

    #[error("timeout waiting for response")]
    Timeout,

    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("{event} event too large: {size} bytes (max {max})")]
    EventTooLarge {
        event: String,
        size: usize,
        max: usize,
    },
}

impl Error {
    /// Whether the failure happened while establishing the connection.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::InvalidUrl(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
