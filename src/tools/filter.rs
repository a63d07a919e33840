//! Name filters for tools and MCP servers.

use crate::mcp::ServerSpec;

use super::SharedTool;

/// Split a comma separated CLI/config value into trimmed, non-empty items.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn clean(patterns: Vec<String>) -> Vec<String> {
    patterns
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Substring filter on tool names.
///
/// The allow list runs first (keep names containing any pattern), then the
/// reject list (drop names containing any pattern). An empty list does not
/// filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolFilter {
    allowed: Vec<String>,
    rejected: Vec<String>,
}

impl ToolFilter {
    pub fn new(allowed: Vec<String>, rejected: Vec<String>) -> Self {
        Self {
            allowed: clean(allowed),
            rejected: clean(rejected),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty() && self.rejected.is_empty()
    }

    pub fn allows(&self, name: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|p| name.contains(p.as_str()))
    }

    pub fn rejects(&self, name: &str) -> bool {
        self.rejected.iter().any(|p| name.contains(p.as_str()))
    }

    pub fn apply(&self, tools: Vec<SharedTool>) -> Vec<SharedTool> {
        tools
            .into_iter()
            .filter(|t| self.allows(t.name()))
            .filter(|t| !self.rejects(t.name()))
            .collect()
    }
}

/// Exact-name filter on MCP servers. A non-empty `use` list wins outright;
/// the `skip` list only applies when no `use` list is given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerFilter {
    use_only: Vec<String>,
    skip: Vec<String>,
}

impl ServerFilter {
    pub fn new(use_only: Vec<String>, skip: Vec<String>) -> Self {
        Self {
            use_only: clean(use_only),
            skip: clean(skip),
        }
    }

    pub fn permits(&self, name: &str) -> bool {
        if !self.use_only.is_empty() {
            return self.use_only.iter().any(|n| n == name);
        }
        !self.skip.iter().any(|n| n == name)
    }

    pub fn apply(&self, specs: &[ServerSpec]) -> Vec<ServerSpec> {
        specs
            .iter()
            .filter(|s| self.permits(&s.name))
            .cloned()
            .collect()
    }
}
