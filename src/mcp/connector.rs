//! Concurrent MCP server connection.
//!
//! A [`ConnectionStep`] opens one server and classifies the handshake; the
//! [`ParallelConnector`] runs one step per server on its own tokio task and
//! merges the outcomes in declaration order once every task has settled.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::bridge::McpTool;
use super::schema::McpToolSchema;
use crate::error::Result;
use crate::tools::filter::ServerFilter;
use crate::tools::SharedTool;

pub const DEFAULT_TIMEOUT_MS: u64 = 8_000;
pub const MAX_TIMEOUT_MS: u64 = 30_000;

pub const REASON_NOT_ALIVE: &str = "Connection failed";
pub const REASON_NO_RESPONSE: &str = "Connection timed out (no response)";
pub const REASON_EMPTY_CAPABILITIES: &str = "Connection timed out (empty capabilities)";
pub const REASON_NO_CAPABILITIES: &str = "Connection timed out (no capabilities received)";

/// One configured MCP server (stdio child process).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Milliseconds, or seconds when below 1000.
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl ServerSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            timeout: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Normalized timeout: values under 1000 are seconds, result capped at
    /// [`MAX_TIMEOUT_MS`]. Missing or zero falls back to [`DEFAULT_TIMEOUT_MS`].
    pub fn timeout_ms(&self) -> u64 {
        let raw = match self.timeout {
            None | Some(0) => DEFAULT_TIMEOUT_MS,
            Some(t) if t < 1000 => t.saturating_mul(1000),
            Some(t) => t,
        };
        raw.min(MAX_TIMEOUT_MS)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms())
    }
}

/// A live connection to one MCP server.
#[async_trait]
pub trait McpSession: Send + Sync {
    /// Whether the underlying process/transport is still running.
    fn is_alive(&self) -> bool;

    /// Capabilities the server declared during the handshake, as JSON.
    fn capabilities(&self) -> Option<serde_json::Value>;

    async fn list_tools(&self) -> Result<Vec<McpToolSchema>>;

    async fn call_tool(&self, name: &str, arguments: serde_json::Value)
        -> Result<serde_json::Value>;

    /// Shut the session down. Sessions without an explicit shutdown keep the
    /// default no-op.
    async fn close(&self) {}
}

/// Opens sessions for server specs.
#[async_trait]
pub trait McpConnector: Send + Sync {
    async fn open(&self, spec: &ServerSpec) -> Result<Arc<dyn McpSession>>;
}

/// Result of one connection attempt.
pub enum ConnectionOutcome {
    Connected {
        tools: Vec<SharedTool>,
        session: Arc<dyn McpSession>,
    },
    Failed {
        reason: String,
    },
}

impl ConnectionOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl std::fmt::Debug for ConnectionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected { tools, .. } => f
                .debug_struct("Connected")
                .field("tools", &tools.len())
                .finish(),
            Self::Failed { reason } => f.debug_struct("Failed").field("reason", reason).finish(),
        }
    }
}

/// Map liveness and the capability payload to a failure reason, or `None`
/// when the handshake is usable.
pub fn classify_handshake(alive: bool, capabilities: Option<&serde_json::Value>) -> Option<&'static str> {
    if !alive {
        return Some(REASON_NOT_ALIVE);
    }
    match capabilities {
        None | Some(serde_json::Value::Null) => Some(REASON_NO_RESPONSE),
        Some(serde_json::Value::Object(map)) if map.is_empty() => Some(REASON_EMPTY_CAPABILITIES),
        Some(serde_json::Value::Object(_)) => None,
        Some(_) => Some(REASON_NO_CAPABILITIES),
    }
}

/// A single connection attempt against one server.
#[derive(Clone)]
pub struct ConnectionStep {
    connector: Arc<dyn McpConnector>,
}

impl ConnectionStep {
    pub fn new(connector: Arc<dyn McpConnector>) -> Self {
        Self { connector }
    }

    /// Open the session, require a live transport with non-empty
    /// capabilities, then fetch tools, all within the server's timeout. A
    /// failed or late tool listing still counts as connected, with no tools.
    pub async fn attempt(&self, spec: &ServerSpec) -> ConnectionOutcome {
        let deadline = Instant::now() + spec.timeout();
        debug!(server = %spec.name, timeout_ms = spec.timeout_ms(), "Opening MCP session");

        let session = match timeout_at(deadline, self.connector.open(spec)).await {
            Err(_) => return ConnectionOutcome::failed(REASON_NO_RESPONSE),
            Ok(Err(e)) => return ConnectionOutcome::failed(format!("{REASON_NOT_ALIVE}: {e}")),
            Ok(Ok(session)) => session,
        };

        let capabilities = session.capabilities();
        if let Some(reason) = classify_handshake(session.is_alive(), capabilities.as_ref()) {
            session.close().await;
            return ConnectionOutcome::failed(reason);
        }

        let schemas = match timeout_at(deadline, session.list_tools()).await {
            Ok(Ok(schemas)) => schemas,
            Ok(Err(e)) => {
                warn!(server = %spec.name, error = %e, "Listing MCP tools failed");
                Vec::new()
            }
            Err(_) => {
                warn!(server = %spec.name, "Listing MCP tools timed out");
                Vec::new()
            }
        };

        let tools = schemas
            .into_iter()
            .map(|schema| {
                Arc::new(McpTool::new(spec.name.clone(), Arc::clone(&session), schema)) as SharedTool
            })
            .collect();

        ConnectionOutcome::Connected { tools, session }
    }
}

/// A server that did not connect, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedServer {
    pub name: String,
    pub error: String,
}

/// Aggregate of one connection pass.
#[derive(Default)]
pub struct ConnectionReport {
    /// Tools of every connected server, grouped in declaration order.
    pub tools: Vec<SharedTool>,
    pub connected: Vec<String>,
    pub failed: Vec<FailedServer>,
    sessions: Vec<Arc<dyn McpSession>>,
}

impl ConnectionReport {
    pub fn is_empty(&self) -> bool {
        self.connected.is_empty() && self.failed.is_empty()
    }

    /// One line per server, for the `//tools` listing and startup output.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for name in &self.connected {
            let count = self
                .tools
                .iter()
                .filter(|t| matches!(t.origin(), crate::tools::ToolOrigin::Mcp(ref s) if s == name))
                .count();
            lines.push(format!("  {name}: connected ({count} tools)"));
        }
        for failed in &self.failed {
            lines.push(format!("  {}: {}", failed.name, failed.error));
        }
        lines.join("\n")
    }

    /// Close every open session.
    pub async fn shutdown(&mut self) {
        for session in self.sessions.drain(..) {
            session.close().await;
        }
    }
}

impl std::fmt::Debug for ConnectionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionReport")
            .field("tools", &self.tools.len())
            .field("connected", &self.connected)
            .field("failed", &self.failed)
            .finish()
    }
}

/// Connects to many servers at once with per-server failure isolation.
pub struct ParallelConnector {
    connector: Arc<dyn McpConnector>,
    filter: ServerFilter,
}

impl ParallelConnector {
    pub fn new(connector: Arc<dyn McpConnector>) -> Self {
        Self {
            connector,
            filter: ServerFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: ServerFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Connect to every server that passes the filter.
    ///
    /// Each attempt runs on its own task, so a panic or timeout only fills
    /// that server's slot with a failure. Outcomes are merged after all
    /// tasks join, in the order the servers were declared.
    pub async fn connect_all(&self, specs: &[ServerSpec]) -> ConnectionReport {
        let specs = self.filter.apply(specs);
        if specs.is_empty() {
            return ConnectionReport::default();
        }

        info!(servers = specs.len(), "Connecting to MCP servers");

        let handles = specs.iter().cloned().map(|spec| {
            let step = ConnectionStep::new(Arc::clone(&self.connector));
            tokio::spawn(async move { step.attempt(&spec).await })
        });
        let slots = join_all(handles).await;

        let mut report = ConnectionReport::default();
        for (spec, slot) in specs.iter().zip(slots) {
            let outcome = slot.unwrap_or_else(|e| {
                ConnectionOutcome::failed(format!("{REASON_NOT_ALIVE}: {e}"))
            });
            match outcome {
                ConnectionOutcome::Connected { tools, session } => {
                    info!(server = %spec.name, tools = tools.len(), "MCP server connected");
                    report.connected.push(spec.name.clone());
                    report.tools.extend(tools);
                    report.sessions.push(session);
                }
                ConnectionOutcome::Failed { reason } => {
                    warn!(server = %spec.name, reason = %reason, "MCP server failed to connect");
                    report.failed.push(FailedServer {
                        name: spec.name.clone(),
                        error: reason,
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timeout_normalization() {
        let spec = ServerSpec::new("fs", "npx");
        assert_eq!(spec.timeout_ms(), DEFAULT_TIMEOUT_MS);
        assert_eq!(spec.clone().with_timeout(5).timeout_ms(), 5_000);
        assert_eq!(spec.clone().with_timeout(2_500).timeout_ms(), 2_500);
        assert_eq!(spec.clone().with_timeout(120).timeout_ms(), MAX_TIMEOUT_MS);
        assert_eq!(spec.clone().with_timeout(90_000).timeout_ms(), MAX_TIMEOUT_MS);
        assert_eq!(spec.with_timeout(0).timeout_ms(), DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn handshake_classification() {
        assert_eq!(classify_handshake(false, Some(&json!({"tools": {}}))), Some(REASON_NOT_ALIVE));
        assert_eq!(classify_handshake(true, None), Some(REASON_NO_RESPONSE));
        assert_eq!(classify_handshake(true, Some(&json!({}))), Some(REASON_EMPTY_CAPABILITIES));
        assert_eq!(classify_handshake(true, Some(&json!("tools"))), Some(REASON_NO_CAPABILITIES));
        assert_eq!(classify_handshake(true, Some(&json!({"tools": {}}))), None);
    }

    #[tokio::test]
    async fn empty_server_list_is_an_empty_report() {
        struct NeverCalled;

        #[async_trait]
        impl McpConnector for NeverCalled {
            async fn open(&self, _spec: &ServerSpec) -> Result<Arc<dyn McpSession>> {
                panic!("no server should be opened");
            }
        }

        let report = ParallelConnector::new(Arc::new(NeverCalled)).connect_all(&[]).await;
        assert!(report.is_empty());
        assert!(report.tools.is_empty());
    }
}
