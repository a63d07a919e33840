//! TOML application config.
//!
//! Looked up at `--config <path>` or `<config_dir>/parley/config.toml`.
//! A missing default file is not an error; a missing explicit file is.
//!
//! ```toml
//! consensus = false
//! system_prompt = "You are a helpful assistant."
//! roles_dir = "~/.prompts/roles"
//!
//! [[models]]
//! name = "openai/gpt-4o"
//!
//! [[models]]
//! name = "ollama/llama3.2"
//! role = "reviewer"
//!
//! [tools]
//! allowed = ["read_", "search"]
//! rejected = ["shell"]
//!
//! [mcp]
//! use = ["filesystem"]
//!
//! [[mcp.servers]]
//! name = "filesystem"
//! command = "npx"
//! args = ["-y", "@modelcontextprotocol/server-filesystem", "."]
//! timeout = 10
//!
//! [providers.ollama]
//! base_url = "http://gpu-box:11434"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ParleyError, Result};
use crate::mcp::ServerSpec;

/// Root of the config file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub models: Vec<ModelEntry>,
    pub consensus: bool,
    pub system_prompt: Option<String>,
    pub roles_dir: Option<PathBuf>,
    pub tools: ToolsSection,
    pub mcp: McpSection,
    pub providers: HashMap<String, ProviderEntry>,
    pub generation: GenerationSection,
}

/// One configured model slot.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Tool allow/reject patterns (substring match on tool names).
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsSection {
    pub allowed: Vec<String>,
    pub rejected: Vec<String>,
}

/// MCP server declarations and server-name filters.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct McpSection {
    pub skip: bool,
    #[serde(rename = "use")]
    pub use_servers: Vec<String>,
    pub skip_servers: Vec<String>,
    pub servers: Vec<ServerSpec>,
}

/// Per-provider credentials override.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ProviderEntry {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSection {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl AppConfig {
    /// Parse config from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load the config file.
    ///
    /// With an explicit path the file must exist. Without one, the default
    /// location is used when present and an empty config otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ParleyError::Configuration(format!(
                        "config file not found: {}",
                        explicit.display()
                    )));
                }
                explicit.to_path_buf()
            }
            None => match Self::default_path() {
                Some(default) if default.exists() => default,
                _ => {
                    tracing::debug!("no config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        tracing::debug!(path = %path.display(), "loading config file");
        let raw = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&raw)
    }

    /// Default config location (`<config_dir>/parley/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "parley")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_full_document() {
        let config = AppConfig::from_toml_str(
            r#"
            consensus = true
            system_prompt = "be brief"

            [[models]]
            name = "openai/gpt-4o"

            [[models]]
            name = "openai/gpt-4o"
            role = "critic"

            [tools]
            rejected = ["shell"]

            [mcp]
            use = ["fs"]
            skip_servers = ["github"]

            [[mcp.servers]]
            name = "fs"
            command = "npx"
            args = ["-y", "server-filesystem"]
            timeout = 5

            [mcp.servers.env]
            ROOT = "/tmp"

            [providers.ollama]
            base_url = "http://localhost:11434"
            "#,
        )
        .expect("config should parse");

        assert!(config.consensus);
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[1].role.as_deref(), Some("critic"));
        assert_eq!(config.tools.rejected, vec!["shell".to_string()]);
        assert_eq!(config.mcp.use_servers, vec!["fs".to_string()]);
        assert_eq!(config.mcp.servers[0].command, "npx");
        assert_eq!(config.mcp.servers[0].timeout_ms(), 5000);
        assert_eq!(config.mcp.servers[0].env.get("ROOT").map(String::as_str), Some("/tmp"));
        assert_eq!(
            config.providers["ollama"].base_url.as_deref(),
            Some("http://localhost:11434")
        );
    }

    #[test]
    fn empty_document_is_default() {
        let config = AppConfig::from_toml_str("").expect("empty config should parse");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("nope.toml")))
            .expect_err("missing explicit config should fail");
        assert!(matches!(err, ParleyError::Configuration(message) if message.contains("nope.toml")));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[models]]\nname = \"anthropic/claude-sonnet-4-5\"\n").unwrap();

        let config = AppConfig::load(Some(&path)).expect("config should load");
        assert_eq!(config.models[0].name, "anthropic/claude-sonnet-4-5");
    }
}
