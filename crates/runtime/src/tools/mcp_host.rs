//! MCP-backed tool host.

use std::collections::HashSet;

use super::{ToolArguments, ToolError, ToolHost};
use crate::model::{ToolCall, ToolSpec};
use mcp::{Client, ClientConfig};
use serde_json::Value;
use tracing::{debug, error, info};

/// Tool host backed by an MCP server.
pub struct McpToolHost {
    client: Client,
    specs: Vec<ToolSpec>,
    prompts: HashSet<String>,
    attach_prompts: bool,
}

impl McpToolHost {
    /// Connect to the MCP server and cache its tool specs.
    pub async fn connect(config: ClientConfig) -> Result<Self, mcp::Error> {
        let url = config.url.clone();
        let client = Client::connect(config).await.inspect_err(|e| {
            error!(url = %url, error = %e, "failed to connect to MCP server");
        })?;

        let specs: Vec<ToolSpec> = client.tools().await.into_iter().map(ToolSpec::from).collect();
        let prompts = client.prompts().await.into_iter().map(|p| p.name).collect();

        info!(
            tools = ?specs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "connected to MCP server"
        );

        Ok(Self {
            client,
            specs,
            prompts,
            attach_prompts: false,
        })
    }

    /// Attach the server's same-named prompt template to each tool call,
    /// under the `prompt` argument.
    pub fn with_prompt_templates(mut self, enabled: bool) -> Self {
        self.attach_prompts = enabled;
        self
    }

    /// The underlying MCP client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Close the server connection.
    pub async fn shutdown(self) -> Result<(), mcp::Error> {
        self.client.shutdown().await
    }

    async fn attach_prompt(
        &self,
        name: &str,
        arguments: &mut ToolArguments,
    ) -> Result<(), ToolError> {
        if !self.attach_prompts || !self.prompts.contains(name) {
            return Ok(());
        }

        let prompt = self
            .client
            .get_prompt(name, arguments.to_prompt_arguments())
            .await?;
        debug!(tool = name, "attaching prompt template");

        let value = serde_json::to_value(&prompt)
            .map_err(|e| ToolError::Execution(format!("serialize prompt: {e}")))?;
        arguments.insert("prompt", value);
        Ok(())
    }
}

impl ToolHost for McpToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        if !self.specs.iter().any(|spec| spec.name == call.name) {
            return Err(ToolError::NotFound(call.name.clone()));
        }

        let mut arguments = ToolArguments::try_from(call.input.clone())?;
        self.attach_prompt(&call.name, &mut arguments).await?;

        let result = self
            .client
            .call_tool(&call.name, arguments.into_value())
            .await
            .inspect_err(|e| error!(tool = %call.name, error = %e, "tool call failed"))?;

        Ok(Value::Array(result.content))
    }
}
