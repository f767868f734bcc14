use thiserror::Error;

/// Errors that can occur during tool execution.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl From<mcp::Error> for ToolError {
    fn from(e: mcp::Error) -> Self {
        Self::Execution(e.to_string())
    }
}
