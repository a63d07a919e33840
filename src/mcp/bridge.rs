//! Bridge MCP tools into the parley tool system.

use std::sync::Arc;

use async_trait::async_trait;

use super::connector::McpSession;
use super::schema::McpToolSchema;
use crate::error::ParleyError;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolOrigin};

/// A tool served by an MCP server. Calls go to the owning session.
pub struct McpTool {
    server: String,
    name: String,
    description: String,
    parameters: AgentToolParameters,
    session: Arc<dyn McpSession>,
}

impl McpTool {
    pub fn new(server: impl Into<String>, session: Arc<dyn McpSession>, schema: McpToolSchema) -> Self {
        let parameters = schema.parameters();
        Self {
            server: server.into(),
            description: schema.description.unwrap_or_default(),
            name: schema.name,
            parameters,
            session,
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    fn origin(&self) -> ToolOrigin {
        ToolOrigin::Mcp(self.server.clone())
    }

    async fn execute(&self, args: &ToolArguments) -> Result<serde_json::Value, ParleyError> {
        if !self.session.is_alive() {
            return Err(ParleyError::ToolExecution {
                tool_name: self.name.clone(),
                message: format!("MCP server '{}' is no longer running", self.server),
            });
        }
        self.session.call_tool(&self.name, args.raw().clone()).await
    }
}

impl std::fmt::Debug for McpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpTool")
            .field("server", &self.server)
            .field("name", &self.name)
            .finish()
    }
}
