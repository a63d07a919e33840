//! Model Context Protocol (MCP) connection pipeline and tool bridge.

pub mod bridge;
#[cfg(feature = "mcp")]
pub mod client;
pub mod connector;
pub mod schema;

pub use bridge::McpTool;
pub use connector::{
    ConnectionOutcome, ConnectionReport, ConnectionStep, FailedServer, McpConnector, McpSession,
    ParallelConnector, ServerSpec,
};
pub use schema::McpToolSchema;

use std::sync::Arc;

/// The connector used by the binary: stdio child processes when built with
/// the `mcp` feature.
#[cfg(feature = "mcp")]
pub fn default_connector() -> Arc<dyn McpConnector> {
    Arc::new(client::StdioConnector)
}

#[cfg(not(feature = "mcp"))]
pub fn default_connector() -> Arc<dyn McpConnector> {
    Arc::new(Unsupported)
}

#[cfg(not(feature = "mcp"))]
struct Unsupported;

#[cfg(not(feature = "mcp"))]
#[async_trait::async_trait]
impl McpConnector for Unsupported {
    async fn open(&self, _spec: &ServerSpec) -> crate::error::Result<Arc<dyn McpSession>> {
        Err(crate::error::ParleyError::Mcp(
            "built without the `mcp` feature".into(),
        ))
    }
}
