//! Tool loading: local tools, MCP tools, filters and de-duplication.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use super::filter::{ServerFilter, ToolFilter};
use super::SharedTool;
use crate::mcp::{ConnectionReport, McpConnector, ParallelConnector, ServerSpec};

/// Tools ready to attach to model contexts, plus what happened on the way.
#[derive(Default)]
pub struct ToolLoadReport {
    pub tools: Vec<SharedTool>,
    /// One entry per dropped duplicate.
    pub warnings: Vec<String>,
    pub connection: ConnectionReport,
}

impl ToolLoadReport {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Tools with their origin, then MCP server states and load warnings.
    pub fn describe(&self) -> String {
        let mut lines = Vec::new();

        if self.tools.is_empty() {
            lines.push("No tools loaded".to_string());
        } else {
            lines.push(format!("Tools ({}):", self.tools.len()));
            for tool in &self.tools {
                lines.push(format!("  {} [{}]", tool.name(), tool.origin()));
            }
        }

        if !self.connection.is_empty() {
            lines.push("MCP servers:".to_string());
            lines.push(self.connection.summary());
        }

        for warning in &self.warnings {
            lines.push(format!("  warning: {warning}"));
        }

        lines.join("\n")
    }
}

impl std::fmt::Debug for ToolLoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLoadReport")
            .field("tools", &self.tool_names())
            .field("warnings", &self.warnings)
            .field("connection", &self.connection)
            .finish()
    }
}

/// Gathers tools from every source and applies the configured filters.
pub struct ToolPipeline {
    local: Vec<SharedTool>,
    servers: Vec<ServerSpec>,
    connector: ParallelConnector,
    filter: ToolFilter,
    skip_mcp: bool,
}

impl ToolPipeline {
    pub fn new(connector: Arc<dyn McpConnector>) -> Self {
        Self {
            local: Vec::new(),
            servers: Vec::new(),
            connector: ParallelConnector::new(connector),
            filter: ToolFilter::default(),
            skip_mcp: false,
        }
    }

    pub fn with_local_tools(mut self, tools: Vec<SharedTool>) -> Self {
        self.local = tools;
        self
    }

    pub fn with_servers(mut self, servers: Vec<ServerSpec>) -> Self {
        self.servers = servers;
        self
    }

    pub fn with_server_filter(mut self, filter: ServerFilter) -> Self {
        self.connector = self.connector.with_filter(filter);
        self
    }

    pub fn with_filter(mut self, filter: ToolFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn skip_mcp(mut self, skip: bool) -> Self {
        self.skip_mcp = skip;
        self
    }

    /// local → remote → allow → reject → dedupe.
    pub async fn load(&self) -> ToolLoadReport {
        let connection = if self.skip_mcp {
            ConnectionReport::default()
        } else {
            self.connector.connect_all(&self.servers).await
        };

        let mut merged = self.local.clone();
        merged.extend(connection.tools.iter().cloned());

        let (tools, warnings) = dedupe(self.filter.apply(merged));
        for warning in &warnings {
            warn!("{warning}");
        }

        ToolLoadReport {
            tools,
            warnings,
            connection,
        }
    }
}

/// Keep the first tool of each name; report every later one.
pub fn dedupe(tools: Vec<SharedTool>) -> (Vec<SharedTool>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(tools.len());
    let mut warnings = Vec::new();

    for tool in tools {
        if seen.insert(tool.name().to_string()) {
            kept.push(tool);
        } else {
            warnings.push(format!(
                "Duplicate tool '{}' from {} ignored",
                tool.name(),
                tool.origin()
            ));
        }
    }

    (kept, warnings)
}
