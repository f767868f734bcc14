//! cryptochat runtime: conversation driver, completion backend and tools.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **Conversation**: one chat session. Sends user text plus the tool
//!   catalog to the model, runs the tool calls it asks for and fetches the
//!   follow-up answer.
//! - **Backend**: a trait abstracting completion providers (Anthropic).
//! - **ToolHost**: a trait abstracting where tools run; [`McpToolHost`]
//!   runs them on an MCP server.
//! - **CryptoTools**: typed wrappers over the crypto server's tools.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{AnthropicBackend, Conversation, McpToolHost};
//!
//! # async fn example() -> runtime::Result<()> {
//! let tools = McpToolHost::connect(mcp::ClientConfig::new("http://localhost:8000")).await?;
//! let backend = AnthropicBackend::builder("sk-ant-api01-...").build();
//!
//! let mut conversation = Conversation::new(backend, tools);
//! let answer = conversation.process_query("What is bitcoin worth in EUR?").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

mod conversation;
pub mod crypto;
mod error;
pub mod model;
pub mod providers;
pub mod tools;

pub use conversation::Conversation;
pub use crypto::CryptoTools;
pub use error::{Error, Result};
pub use model::{Backend, Message, ModelError, Part, Role, ToolCall, ToolSpec, Usage};
pub use providers::{AnthropicBackend, AnthropicBackendBuilder};
pub use tools::{EmptyToolHost, McpToolHost, ToolError, ToolHost};
