use thiserror::Error;

use crate::model::ModelError;
use crate::tools::ToolError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Connection(#[from] mcp::Error),

    #[error("completion failed: {0}")]
    Model(#[from] ModelError),

    #[error("tool {name} failed: {source}")]
    Tool {
        name: String,
        #[source]
        source: ToolError,
    },
}

impl Error {
    pub(crate) fn tool(name: impl Into<String>, source: ToolError) -> Self {
        Self::Tool {
            name: name.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
