//! Command line interface for Parley.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::AppConfig;
use crate::error::Result;
use crate::models::ModelSelector;
use crate::tools::filter::parse_list;

/// Chat with several models at once
#[derive(Parser, Debug, Default, PartialEq)]
#[command(name = "parley", version, about = "Parley: one prompt, many models")]
pub struct Cli {
    /// Models as `name[=role]`, comma-separated; may be repeated
    #[arg(short, long = "model", value_name = "MODELS", action = ArgAction::Append)]
    pub models: Vec<String>,

    /// Synthesize one answer from all model responses
    #[arg(long)]
    pub consensus: bool,

    /// Show individual responses only
    #[arg(long)]
    pub no_consensus: bool,

    /// Do not start any MCP server
    #[arg(long)]
    pub no_mcp: bool,

    /// Start only these MCP servers (comma-separated)
    #[arg(long, value_name = "SERVERS")]
    pub mcp_use: Option<String>,

    /// Do not start these MCP servers (comma-separated)
    #[arg(long, value_name = "SERVERS")]
    pub mcp_skip: Option<String>,

    /// Keep only tools whose name contains one of these patterns
    #[arg(long, value_name = "PATTERNS")]
    pub allowed_tools: Option<String>,

    /// Drop tools whose name contains one of these patterns
    #[arg(long, value_name = "PATTERNS")]
    pub rejected_tools: Option<String>,

    /// Directory with `<role>.md` prompt files
    #[arg(long, value_name = "DIR")]
    pub roles_dir: Option<PathBuf>,

    /// System prompt for every model
    #[arg(short, long)]
    pub system: Option<String>,

    /// Config file (default: <config dir>/parley/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Keep reading prompts from stdin after the first answer
    #[arg(long)]
    pub chat: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Prompt to send (omit with --chat to start interactively)
    pub prompt: Option<String>,
}

impl Cli {
    /// Layer command line flags over the file config. Flags win.
    pub fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if !self.models.is_empty() {
            let mut entries = Vec::new();
            for raw in &self.models {
                entries.extend(ModelSelector::parse_list(raw)?);
            }
            config.models = entries;
        }

        if self.consensus {
            config.consensus = true;
        } else if self.no_consensus {
            config.consensus = false;
        }

        if self.no_mcp {
            config.mcp.skip = true;
        }
        if let Some(raw) = &self.mcp_use {
            config.mcp.use_servers = parse_list(raw);
        }
        if let Some(raw) = &self.mcp_skip {
            config.mcp.skip_servers = parse_list(raw);
        }
        if let Some(raw) = &self.allowed_tools {
            config.tools.allowed = parse_list(raw);
        }
        if let Some(raw) = &self.rejected_tools {
            config.tools.rejected = parse_list(raw);
        }
        if let Some(dir) = &self.roles_dir {
            config.roles_dir = Some(dir.clone());
        }
        if let Some(system) = &self.system {
            config.system_prompt = Some(system.clone());
        }
        Ok(())
    }
}
