//! One model slot: provider handle, isolated credentials and its history.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::checkpoint::History;
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::models::ModelSpec;
use crate::provider::{self, ModelProvider, ProviderRequest, ToolDefinition};
use crate::tools::{SharedTool, ToolArguments};
use crate::types::{GenerationSettings, Message, Role, Usage};
use crate::util::retry::RetryPolicy;

/// Maximum tool loop iterations per turn.
const MAX_TOOL_ITERATIONS: usize = 20;

/// Input for one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptInput {
    Text(String),
    /// A structured conversation fragment appended to the history as-is.
    Messages(Vec<Message>),
}

impl PromptInput {
    /// Prepend `prefix` to the whole text, or to the first user message of a
    /// structured prompt.
    pub fn prepend(&mut self, prefix: &str) {
        match self {
            Self::Text(text) => *text = format!("{prefix}{text}"),
            Self::Messages(messages) => {
                if let Some(first_user) = messages.iter_mut().find(|m| m.role == Role::User) {
                    first_user.prepend_text(prefix);
                }
            }
        }
    }

    /// The text a person would read as "the prompt".
    pub fn display_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Messages(messages) => messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(Message::text_content)
                .unwrap_or_default(),
        }
    }
}

impl From<&str> for PromptInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for PromptInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Final answer of one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub content: String,
    /// Summed over every provider call of the turn.
    pub usage: Usage,
}

pub struct ModelContext {
    spec: ModelSpec,
    config: ProviderConfig,
    provider: Box<dyn ModelProvider>,
    messages: Vec<Message>,
    tools: Vec<SharedTool>,
    settings: GenerationSettings,
    retry: RetryPolicy,
}

impl ModelContext {
    /// Build a context with its own copy of `config`.
    pub fn new(spec: ModelSpec, config: &ProviderConfig) -> Result<Self> {
        let config = config.clone();
        let provider = provider::create_provider(&spec.model_ref(), &config)?;
        Ok(Self::with_provider(spec, config, provider))
    }

    /// Build a context around an existing provider.
    pub fn with_provider(
        spec: ModelSpec,
        config: ProviderConfig,
        provider: Box<dyn ModelProvider>,
    ) -> Self {
        Self {
            spec,
            config,
            provider,
            messages: Vec::new(),
            tools: Vec::new(),
            settings: GenerationSettings::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.messages.push(Message::system(prompt));
        self
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn internal_id(&self) -> String {
        self.spec.internal_id()
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn tools(&self) -> &[SharedTool] {
        &self.tools
    }

    pub fn set_tools(&mut self, tools: Vec<SharedTool>) {
        self.tools = tools;
    }

    /// Whether a user turn has been sent in this conversation yet.
    pub fn has_user_turn(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    /// Run one turn: append the prompt, call the provider, execute tool calls
    /// until the model answers in text (or the iteration cap is reached).
    pub async fn chat(&mut self, prompt: PromptInput) -> Result<ChatReply> {
        let repaired = repair_tool_results(&mut self.messages);
        if repaired > 0 {
            warn!(model = %self.spec.internal_id(), repaired, "Added missing tool results");
        }

        match prompt {
            PromptInput::Text(text) => self.messages.push(Message::user(text)),
            PromptInput::Messages(messages) => self.messages.extend(messages),
        }

        let tool_defs = self.tool_definitions();
        let mut usage = Usage::default();
        let mut last_text = String::new();

        for iteration in 0..MAX_TOOL_ITERATIONS {
            let request = ProviderRequest {
                messages: self.messages.clone(),
                settings: self.settings.clone(),
                tools: tool_defs.clone(),
            };

            debug!(model = %self.spec.internal_id(), iteration, "chat: calling provider");
            let provider = self.provider.as_ref();
            let response = self
                .retry
                .execute(|| provider.generate_text(&request))
                .await?;
            usage.merge(&response.usage);

            if response.tool_calls.is_empty() {
                self.messages.push(Message::assistant(response.text.clone()));
                return Ok(ChatReply {
                    content: response.text,
                    usage,
                });
            }

            self.messages.push(Message::assistant_with_tool_calls(
                response.text.clone(),
                response.tool_calls.clone(),
            ));
            last_text = response.text;

            for call in &response.tool_calls {
                let result = self.run_tool(&call.name, &call.arguments).await;
                let message = match result {
                    Ok(value) => Message::tool_result(call.id.clone(), value, false),
                    Err(error) => {
                        warn!(tool = %call.name, error = %error, "Tool execution failed");
                        Message::tool_result(
                            call.id.clone(),
                            serde_json::json!({ "error": error }),
                            true,
                        )
                    }
                };
                self.messages.push(message);
            }
        }

        warn!(model = %self.spec.internal_id(), "Tool loop hit the iteration limit");
        Ok(ChatReply {
            content: last_text,
            usage,
        })
    }

    /// Send a single prompt outside the conversation. History is untouched.
    pub async fn complete_once(&self, prompt: &str) -> Result<ChatReply> {
        let request = ProviderRequest {
            messages: vec![Message::user(prompt)],
            settings: self.settings.clone(),
            tools: None,
        };
        let provider = self.provider.as_ref();
        let response = self
            .retry
            .execute(|| provider.generate_text(&request))
            .await?;
        Ok(ChatReply {
            content: response.text,
            usage: response.usage,
        })
    }

    fn tool_definitions(&self) -> Option<Vec<ToolDefinition>> {
        if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.iter().map(|t| t.definition()).collect())
        }
    }

    /// Execute one tool call. Errors and panics both come back as a message.
    async fn run_tool(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, String> {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            return Err(format!("Tool '{name}' not found"));
        };
        let args = ToolArguments::new(arguments.clone());
        match AssertUnwindSafe(tool.execute(&args)).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(format!("Tool '{name}' crashed: {}", panic_message(&panic))),
        }
    }
}

impl History for ModelContext {
    fn history_id(&self) -> String {
        self.spec.internal_id()
    }

    fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }
}

impl std::fmt::Debug for ModelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelContext")
            .field("spec", &self.spec)
            .field("provider", &self.provider.provider_name())
            .field("messages", &self.messages.len())
            .field("tools", &self.tools.len())
            .finish()
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

/// Give every unanswered tool call a synthetic error result, placed after
/// the results that did arrive for that assistant message. Returns how many
/// were added.
pub fn repair_tool_results(messages: &mut Vec<Message>) -> usize {
    let answered: HashSet<String> = messages
        .iter()
        .flat_map(|m| m.tool_results().into_iter().map(|r| r.tool_call_id.clone()))
        .collect();

    let has_dangling = messages.iter().any(|m| {
        m.role == Role::Assistant && m.tool_calls().iter().any(|c| !answered.contains(&c.id))
    });
    if !has_dangling {
        return 0;
    }

    let mut repaired = Vec::with_capacity(messages.len());
    let mut pending: Vec<String> = Vec::new();
    let mut added = 0;

    let flush = |pending: &mut Vec<String>, out: &mut Vec<Message>, added: &mut usize| {
        for id in pending.drain(..) {
            out.push(Message::tool_result(
                id,
                serde_json::json!({ "error": "Tool call did not complete" }),
                true,
            ));
            *added += 1;
        }
    };

    for message in messages.drain(..) {
        if message.role != Role::Tool {
            flush(&mut pending, &mut repaired, &mut added);
        }
        if message.role == Role::Assistant {
            pending = message
                .tool_calls()
                .iter()
                .filter(|c| !answered.contains(&c.id))
                .map(|c| c.id.clone())
                .collect();
        }
        repaired.push(message);
    }
    flush(&mut pending, &mut repaired, &mut added);

    *messages = repaired;
    added
}
