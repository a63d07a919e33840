//! Reduction of per-model results into display text.

use serde::Serialize;

use super::context::ChatReply;
use crate::models::ModelSpec;

/// Result of one model in a multi-model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutcome {
    Reply(ChatReply),
    /// Inline error text, already prefixed with the model id.
    Error(String),
}

impl ModelOutcome {
    pub fn content(&self) -> &str {
        match self {
            Self::Reply(reply) => &reply.content,
            Self::Error(message) => message,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Token usage of one model for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelMetrics {
    pub model_id: String,
    pub display_name: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// `from: <display name>` followed by the content.
pub fn labeled_block(spec: &ModelSpec, content: &str) -> String {
    format!("from: {}\n{}", spec.display_name(), content)
}

/// Every result as a labeled block, separated by a blank line, in the given
/// order.
pub fn format_individual(results: &[(ModelSpec, ModelOutcome)]) -> String {
    results
        .iter()
        .map(|(spec, outcome)| labeled_block(spec, outcome.content()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One entry per model when any reply reported token usage.
pub fn collect_metrics(results: &[(ModelSpec, ModelOutcome)]) -> Option<Vec<ModelMetrics>> {
    let any_usage = results
        .iter()
        .any(|(_, o)| matches!(o, ModelOutcome::Reply(r) if !r.usage.is_empty()));
    if !any_usage {
        return None;
    }

    Some(
        results
            .iter()
            .map(|(spec, outcome)| {
                let usage = match outcome {
                    ModelOutcome::Reply(reply) => reply.usage,
                    ModelOutcome::Error(_) => Default::default(),
                };
                ModelMetrics {
                    model_id: spec.internal_id(),
                    display_name: spec.display_name(),
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                }
            })
            .collect(),
    )
}

/// Synthesis prompt over the successful results, or `None` when every model
/// failed.
pub fn consensus_prompt(question: &str, results: &[(ModelSpec, ModelOutcome)]) -> Option<String> {
    let answers: Vec<String> = results
        .iter()
        .filter(|(_, outcome)| !outcome.is_error())
        .map(|(spec, outcome)| labeled_block(spec, outcome.content()))
        .collect();
    if answers.is_empty() {
        return None;
    }

    Some(format!(
        "Several AI models answered the same prompt. Compare their responses, \
         resolve disagreements, and write a single best answer. \
         Reply with the answer only.\n\n\
         Prompt:\n{question}\n\n\
         Responses:\n\n{}",
        answers.join("\n\n")
    ))
}

/// Output when the synthesis step fails.
pub fn consensus_fallback(error: &str, individual: &str) -> String {
    format!("Error building consensus: {error}\n\n{individual}")
}
