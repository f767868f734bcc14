//! LLM provider adapters.
//!
//! Each provider implements [`Backend`](crate::model::Backend) for its
//! specific API.

mod anthropic;

pub use anthropic::{
    AnthropicBackend, AnthropicBackendBuilder, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
};
