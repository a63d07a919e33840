//! Local tools available to every model without an MCP server.
//!
//! `read_file`, `write_file`, `list_directory` and `shell` are thin I/O
//! wrappers built with [`AgentTool::new`]. Output is capped so one call cannot
//! flood a model's context.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::tool::{AgentTool, SharedTool};
use super::types::AgentToolParameters;
use crate::error::ParleyError;

const OUTPUT_MAX_BYTES: usize = 32_768;
const READ_FILE_MAX_BYTES: usize = 65_536;
const SHELL_TIMEOUT: Duration = Duration::from_secs(30);

fn tool_error(tool_name: &str, message: impl Into<String>) -> ParleyError {
    ParleyError::ToolExecution {
        tool_name: tool_name.to_string(),
        message: message.into(),
    }
}

/// Cap `s` at `max_bytes` on a char boundary. Returns whether it was cut.
fn cap_output(s: &mut String, max_bytes: usize) -> bool {
    if s.len() <= max_bytes {
        return false;
    }
    let mut cutoff = max_bytes;
    while !s.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    s.truncate(cutoff);
    s.push_str("\n... (truncated)");
    true
}

pub fn read_file_tool() -> SharedTool {
    Arc::new(AgentTool::new(
        "read_file",
        "Read a file's contents as UTF-8 text",
        AgentToolParameters::object()
            .string("path", "Path to the file to read", true)
            .build(),
        |args| async move {
            let path = args.get_str("path")?;
            let mut content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| tool_error("read_file", format!("{path}: {e}")))?;
            let bytes = content.len();
            let truncated = cap_output(&mut content, READ_FILE_MAX_BYTES);
            Ok(json!({ "content": content, "bytes": bytes, "truncated": truncated }))
        },
    ))
}

pub fn write_file_tool() -> SharedTool {
    Arc::new(AgentTool::new(
        "write_file",
        "Write content to a file, creating parent directories if needed",
        AgentToolParameters::object()
            .string("path", "Path to the file to write", true)
            .string("content", "Content to write", true)
            .build(),
        |args| async move {
            let path = args.get_str("path")?;
            let content = args.get_str("content")?;
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| tool_error("write_file", format!("{}: {e}", parent.display())))?;
            }
            tokio::fs::write(path, content)
                .await
                .map_err(|e| tool_error("write_file", format!("{path}: {e}")))?;
            Ok(json!({ "path": path, "bytes_written": content.len() }))
        },
    ))
}

pub fn list_directory_tool() -> SharedTool {
    Arc::new(AgentTool::new(
        "list_directory",
        "List files and directories in a given path",
        AgentToolParameters::object()
            .string("path", "Directory to list (defaults to '.')", false)
            .build(),
        |args| async move {
            let path = args.get_str_opt("path").unwrap_or(".").to_string();
            let mut read_dir = tokio::fs::read_dir(&path)
                .await
                .map_err(|e| tool_error("list_directory", format!("{path}: {e}")))?;

            let mut entries = Vec::new();
            while let Some(entry) = read_dir
                .next_entry()
                .await
                .map_err(|e| tool_error("list_directory", e.to_string()))?
            {
                let kind = match entry.file_type().await {
                    Ok(ft) if ft.is_dir() => "dir",
                    Ok(ft) if ft.is_file() => "file",
                    _ => "other",
                };
                entries.push((entry.file_name().to_string_lossy().into_owned(), kind));
            }
            entries.sort();

            let entries: Vec<_> = entries
                .into_iter()
                .map(|(name, kind)| json!({ "name": name, "type": kind }))
                .collect();
            Ok(json!({ "path": path, "entries": entries }))
        },
    ))
}

pub fn shell_tool() -> SharedTool {
    Arc::new(AgentTool::new(
        "shell",
        "Execute a shell command and return its combined output",
        AgentToolParameters::object()
            .string("command", "The shell command to execute", true)
            .build(),
        |args| async move {
            let command = args.get_str("command")?;
            let output = tokio::time::timeout(
                SHELL_TIMEOUT,
                tokio::process::Command::new("sh").arg("-c").arg(command).output(),
            )
            .await
            .map_err(|_| {
                tool_error(
                    "shell",
                    format!("command timed out after {}s", SHELL_TIMEOUT.as_secs()),
                )
            })?
            .map_err(|e| tool_error("shell", e.to_string()))?;

            let mut combined = format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            let truncated = cap_output(&mut combined, OUTPUT_MAX_BYTES);
            Ok(json!({
                "exit_code": output.status.code(),
                "output": combined,
                "truncated": truncated,
            }))
        },
    ))
}

/// All built-in tools, in listing order.
pub fn all_tools() -> Vec<SharedTool> {
    vec![
        read_file_tool(),
        write_file_tool(),
        list_directory_tool(),
        shell_tool(),
    ]
}
