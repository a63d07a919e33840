//! rmcp-backed stdio sessions.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, CallToolResult, ClientInfo, Content, JsonObject, ProtocolVersion, ResourceContents},
    service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceError, ServiceExt},
    transport::TokioChildProcess,
};
use tokio::process::Command;
use tokio::sync::RwLock;

use super::connector::{McpConnector, McpSession, ServerSpec};
use super::schema::McpToolSchema;
use crate::error::{ParleyError, Result};

type McpRunningService = RunningService<RoleClient, Box<dyn DynService<RoleClient>>>;

/// Spawns each server as a child process speaking MCP over stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioConnector;

#[async_trait]
impl McpConnector for StdioConnector {
    async fn open(&self, spec: &ServerSpec) -> Result<Arc<dyn McpSession>> {
        let mut command = Command::new(&spec.command);
        command.args(&spec.args).envs(&spec.env);

        let transport = TokioChildProcess::new(command).map_err(|e| {
            ParleyError::Mcp(format!("failed to spawn '{}': {e}", spec.command))
        })?;

        let client_info = ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            ..Default::default()
        };
        let service = client_info
            .into_dyn()
            .serve(transport)
            .await
            .map_err(map_client_initialize_error)?;

        Ok(Arc::new(StdioSession {
            server: spec.name.clone(),
            service: RwLock::new(Some(service)),
        }))
    }
}

/// One running stdio server.
pub struct StdioSession {
    server: String,
    service: RwLock<Option<McpRunningService>>,
}

#[async_trait]
impl McpSession for StdioSession {
    fn is_alive(&self) -> bool {
        match self.service.try_read() {
            Ok(guard) => guard.as_ref().is_some_and(|s| !s.is_closed()),
            // Only `close` takes the write lock.
            Err(_) => false,
        }
    }

    fn capabilities(&self) -> Option<serde_json::Value> {
        let guard = self.service.try_read().ok()?;
        let info = guard.as_ref()?.peer_info()?;
        serde_json::to_value(&info.capabilities).ok()
    }

    async fn list_tools(&self) -> Result<Vec<McpToolSchema>> {
        let guard = self.service.read().await;
        let service = guard.as_ref().ok_or_else(|| closed_error(&self.server))?;

        let tools = match service.list_all_tools().await {
            Ok(tools) => tools,
            Err(ServiceError::UnexpectedResponse) => service
                .list_tools(None)
                .await
                .map(|page| page.tools)
                .map_err(|e| map_service_error("list_tools", e))?,
            Err(e) => return Err(map_service_error("list_tools", e)),
        };

        Ok(tools.into_iter().map(map_tool_schema).collect())
    }

    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let guard = self.service.read().await;
        let service = guard.as_ref().ok_or_else(|| closed_error(&self.server))?;

        let result = service
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments: coerce_tool_arguments(arguments)?,
                task: None,
            })
            .await
            .map_err(|e| map_service_error("call_tool", e))?;

        map_call_result(name, result)
    }

    async fn close(&self) {
        if let Some(service) = self.service.write().await.take() {
            if let Err(e) = service.cancel().await {
                tracing::debug!(server = %self.server, error = %e, "MCP session shutdown failed");
            }
        }
    }
}

fn closed_error(server: &str) -> ParleyError {
    ParleyError::Mcp(format!("session for '{server}' is closed"))
}

fn map_tool_schema(tool: rmcp::model::Tool) -> McpToolSchema {
    McpToolSchema {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
    }
}

fn coerce_tool_arguments(value: serde_json::Value) -> Result<Option<JsonObject>> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
                ParleyError::InvalidArgument(format!("MCP tool arguments must be valid JSON: {e}"))
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(ParleyError::InvalidArgument(format!(
            "MCP tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let lines: Vec<String> = content
        .iter()
        .filter_map(|item| {
            if let Some(text) = item.as_text() {
                return Some(text.text.clone());
            }
            match &item.as_resource()?.resource {
                ResourceContents::TextResourceContents { text, .. } => Some(text.clone()),
                _ => None,
            }
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Structured content wins, then joined text, then the raw content array.
fn map_call_result(name: &str, result: CallToolResult) -> Result<serde_json::Value> {
    let text_content = extract_text_content(&result.content);

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or(text_content)
            .unwrap_or_else(|| "MCP tool returned an error result".into());
        return Err(ParleyError::ToolExecution {
            tool_name: name.to_string(),
            message,
        });
    }

    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }
    if let Some(text) = text_content {
        return Ok(serde_json::Value::String(text));
    }
    Ok(serde_json::Value::Array(
        result
            .content
            .iter()
            .filter_map(|item| serde_json::to_value(item).ok())
            .collect(),
    ))
}

fn map_client_initialize_error(error: ClientInitializeError) -> ParleyError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            ParleyError::Mcp(format!("initialize connection closed: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => {
            ParleyError::Mcp(format!("initialize transport error ({context}): {error}"))
        }
        ClientInitializeError::JsonRpcError(error) => ParleyError::Mcp(format!(
            "initialize JSON-RPC error {}: {}",
            error.code.0, error.message
        )),
        ClientInitializeError::Cancelled => ParleyError::Mcp("initialize cancelled".into()),
        other => ParleyError::Mcp(format!("initialize error: {other}")),
    }
}

fn map_service_error(context: &str, error: ServiceError) -> ParleyError {
    match error {
        ServiceError::McpError(error) => ParleyError::Mcp(format!(
            "{context}: MCP error {}: {}",
            error.code.0, error.message
        )),
        ServiceError::TransportSend(error) => {
            ParleyError::Mcp(format!("{context}: transport send failed: {error}"))
        }
        ServiceError::TransportClosed => ParleyError::Mcp(format!("{context}: transport closed")),
        ServiceError::Timeout { timeout } => ParleyError::Timeout(timeout.as_millis() as u64),
        other => ParleyError::Mcp(format!("{context}: {other}")),
    }
}
