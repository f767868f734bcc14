//! Conversation driver: completion, tool round, follow-up.

use tracing::{debug, error, warn};

use crate::model::{
    Backend, Message, ModelRequest, ModelResponse, Part, ToolChoice, ToolResult, Usage,
};
use crate::tools::ToolHost;
use crate::{Error, Result};

/// A chat session against one backend and one tool host.
///
/// Queries run one at a time; the history grows with each successful query
/// and is left untouched by a failed one.
pub struct Conversation<B, H> {
    backend: B,
    tools: H,
    messages: Vec<Message>,
    usage: Usage,
}

impl<B: Backend, H: ToolHost> Conversation<B, H> {
    pub fn new(backend: B, tools: H) -> Self {
        Self {
            backend,
            tools,
            messages: Vec::new(),
            usage: Usage::default(),
        }
    }

    /// Message history so far.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The tool host queries are answered with.
    pub fn tools(&self) -> &H {
        &self.tools
    }

    /// Token usage accumulated over the session.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Answer one user query.
    ///
    /// Returns every text fragment produced, joined by newlines in the
    /// order the model emitted them.
    ///
    /// All tool calls in a response are answered together and followed by a
    /// single follow-up completion, so the follow-up text comes after any
    /// text the first response placed after its tool calls.
    pub async fn process_query(&mut self, text: &str) -> Result<String> {
        let checkpoint = self.messages.len();
        let result = self.run_query(text).await;
        if result.is_err() {
            self.messages.truncate(checkpoint);
        }
        result
    }

    async fn run_query(&mut self, text: &str) -> Result<String> {
        self.messages.push(Message::user(text));

        let response = self.complete(ToolChoice::Auto).await?;

        let mut output = Vec::new();
        let mut results = Vec::new();
        for part in &response.message.parts {
            match part {
                Part::Text(text) => output.push(text.clone()),
                Part::ToolCall(call) => {
                    debug!(tool = %call.name, input = %call.input, "model requested tool");
                    let payload = self.tools.execute(call).await.map_err(|e| {
                        error!(tool = %call.name, error = %e, "tool call failed");
                        Error::tool(&call.name, e)
                    })?;
                    output.push(format!(
                        "Tool {} called with arguments: {}",
                        call.name, call.input
                    ));
                    results.push(ToolResult {
                        tool_call_id: call.id.clone(),
                        output: payload,
                    });
                }
                Part::ToolResult(_) => {}
            }
        }

        if results.is_empty() {
            if !response.message.parts.is_empty() {
                self.messages.push(response.message);
            }
            return Ok(output.join("\n"));
        }

        self.messages.push(response.message);
        self.messages.push(Message::tool_results(results));

        // One round only: the follow-up is asked for text.
        let follow_up = self.complete(ToolChoice::None).await?;
        let dropped = follow_up.message.tool_calls();
        if !dropped.is_empty() {
            warn!(count = dropped.len(), "ignoring tool calls in follow-up response");
        }

        let answer = follow_up.message.text();
        if !answer.is_empty() {
            output.push(answer.clone());
            self.messages.push(Message::assistant(answer));
        }

        Ok(output.join("\n"))
    }

    async fn complete(&mut self, tool_choice: ToolChoice) -> Result<ModelResponse> {
        let request = ModelRequest {
            messages: &self.messages,
            tools: self.tools.specs(),
            tool_choice,
        };
        let response = self.backend.call(request).await.inspect_err(|e| {
            error!(error = %e, "completion request failed");
        })?;
        self.usage += response.usage;
        Ok(response)
    }
}
