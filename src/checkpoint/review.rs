//! Rendering of a history with checkpoint markers.

use super::Checkpoint;
use crate::types::{Message, Role};
use crate::util::text::{single_line, truncate_with_ellipsis};

const CONTENT_CHARS: usize = 200;
const TOOL_RESULT_CHARS: usize = 100;

pub(super) fn render(history_id: &str, messages: &[Message], checkpoints: &[Checkpoint]) -> String {
    let mut lines = vec![format!(
        "Conversation history ({history_id}, {} messages):",
        messages.len()
    )];

    for index in 0..=messages.len() {
        // A checkpoint at position P sits after the P-th message.
        for checkpoint in checkpoints.iter().filter(|c| c.position == index) {
            lines.push(format!("  --- checkpoint '{}' ---", checkpoint.name));
        }
        if let Some(message) = messages.get(index) {
            lines.push(format!(
                "  [{}] {}: {}",
                index + 1,
                message.role,
                summarize(message)
            ));
        }
    }

    if messages.is_empty() && checkpoints.is_empty() {
        lines.push("  (empty)".to_string());
    }

    lines.join("\n")
}

fn summarize(message: &Message) -> String {
    let calls = message.tool_calls();
    if !calls.is_empty() {
        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        return format!("[Tool calls: {}]", names.join(", "));
    }

    if message.role == Role::Tool {
        let results: Vec<String> = message
            .tool_results()
            .iter()
            .map(|r| match &r.result {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        let preview = truncate_with_ellipsis(&single_line(&results.join(" ")), TOOL_RESULT_CHARS);
        return format!("[Tool result: {preview}]");
    }

    truncate_with_ellipsis(&single_line(&message.text_content()), CONTENT_CHARS)
}
