//! Shared test helpers: scripted providers and a scripted MCP connector.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use parley::chat::ModelContext;
use parley::config::ProviderConfig;
use parley::error::{ParleyError, Result};
use parley::mcp::{McpConnector, McpSession, McpToolSchema, ServerSpec};
use parley::models::ModelSpec;
use parley::provider::{ModelProvider, ProviderRequest, ProviderResponse};
use parley::session::ContextFactory;
use parley::types::{FinishReason, Role, ToolCall, Usage};
use parley::util::retry::RetryPolicy;

/// What a [`MockProvider`] does when it has no queued response left.
#[derive(Clone)]
pub enum Fallback {
    /// Answer `"{model}: {last user text}"`.
    Echo,
    Fail(String),
    Panic(String),
}

/// A provider that replays queued responses, then falls back.
pub struct MockProvider {
    model_id: String,
    responses: Mutex<VecDeque<Result<ProviderResponse>>>,
    fallback: Fallback,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl MockProvider {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            responses: Mutex::new(VecDeque::new()),
            fallback: Fallback::Echo,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(model_id: &str, message: &str) -> Self {
        Self::new(model_id).with_fallback(Fallback::Fail(message.into()))
    }

    pub fn panicking(model_id: &str, message: &str) -> Self {
        Self::new(model_id).with_fallback(Fallback::Panic(message.into()))
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared handle on every request this provider receives.
    pub fn requests(&self) -> Arc<Mutex<Vec<ProviderRequest>>> {
        Arc::clone(&self.requests)
    }

    pub fn queue_text(self, text: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(text_response(text)));
        self
    }

    pub fn queue_error(self, error: ParleyError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn queue_tool_call(self, id: &str, name: &str, arguments: serde_json::Value) -> Self {
        self.responses.lock().unwrap().push_back(Ok(ProviderResponse {
            text: String::new(),
            usage: Usage {
                input_tokens: 5,
                output_tokens: 2,
            },
            tool_calls: vec![ToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
            }],
            finish_reason: Some(FinishReason::ToolCalls),
        }));
        self
    }
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        text: text.to_string(),
        usage: Usage {
            input_tokens: 10,
            output_tokens: 20,
        },
        tool_calls: Vec::new(),
        finish_reason: Some(FinishReason::Stop),
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.responses.lock().unwrap().pop_front();
        if let Some(response) = queued {
            return response;
        }

        match &self.fallback {
            Fallback::Echo => {
                let last_user = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.text_content())
                    .unwrap_or_default();
                Ok(text_response(&format!("{}: {last_user}", self.model_id)))
            }
            Fallback::Fail(message) => Err(ParleyError::api(400, message.clone())),
            Fallback::Panic(message) => panic!("{message}"),
        }
    }
}

/// Wrap a provider in a context that never retries.
pub fn context(spec: ModelSpec, provider: MockProvider) -> ModelContext {
    ModelContext::with_provider(spec, ProviderConfig::new(), Box::new(provider))
        .with_retry(RetryPolicy::none())
}

/// Session factory: every model echoes, except names listed in `failing`,
/// which fail to initialize.
pub fn echo_factory(failing: &[&str]) -> ContextFactory {
    let failing: Vec<String> = failing.iter().map(|s| s.to_string()).collect();
    Arc::new(move |spec: ModelSpec, config: &ProviderConfig| {
        if failing.contains(&spec.name) {
            return Err(ParleyError::Authentication(format!("no key for {}", spec.name)));
        }
        let provider = MockProvider::new(&spec.internal_id());
        Ok(ModelContext::with_provider(spec, config.clone(), Box::new(provider))
            .with_retry(RetryPolicy::none()))
    })
}

/// How a scripted MCP server behaves when opened.
#[derive(Clone)]
pub enum ServerBehavior {
    /// Handshake after `delay`, then expose `tools`.
    Ready { tools: Vec<String>, delay: Duration },
    /// `open` returns an error.
    Refuse(String),
    /// `open` never completes.
    Hang,
    /// `open` panics.
    Panic,
    /// Session opens with `{}` capabilities.
    EmptyCapabilities,
    /// Session opens but the process is already gone.
    Dead,
    /// Handshake succeeds, `list_tools` returns an error.
    ListToolsFails(String),
    /// Handshake after `delay`, then `list_tools` never completes.
    ListToolsHangs { delay: Duration },
}

/// How a [`MockSession`] answers `list_tools`.
#[derive(Clone)]
enum Listing {
    Tools(Vec<String>),
    Fail(String),
    Hang,
}

impl ServerBehavior {
    pub fn ready(tools: &[&str]) -> Self {
        Self::Ready {
            tools: tools.iter().map(|t| t.to_string()).collect(),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(tools: &[&str], delay: Duration) -> Self {
        Self::Ready {
            tools: tools.iter().map(|t| t.to_string()).collect(),
            delay,
        }
    }
}

/// Connector whose servers follow a script keyed by server name.
#[derive(Default)]
pub struct MockConnector {
    behaviors: HashMap<String, ServerBehavior>,
    /// Server names in the order their `open` finished.
    pub completed: Arc<Mutex<Vec<String>>>,
    /// Tool calls as `(server, tool, arguments)`.
    pub calls: Arc<Mutex<Vec<(String, String, serde_json::Value)>>>,
    pub closed: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, name: &str, behavior: ServerBehavior) -> Self {
        self.behaviors.insert(name.to_string(), behavior);
        self
    }
}

#[async_trait]
impl McpConnector for MockConnector {
    async fn open(&self, spec: &ServerSpec) -> Result<Arc<dyn McpSession>> {
        let behavior = self
            .behaviors
            .get(&spec.name)
            .cloned()
            .unwrap_or_else(|| ServerBehavior::Refuse(format!("unknown server {}", spec.name)));

        let ready = Some(json!({ "tools": {} }));
        let (listing, alive, capabilities) = match behavior {
            ServerBehavior::Ready { tools, delay } => {
                tokio::time::sleep(delay).await;
                (Listing::Tools(tools), true, ready)
            }
            ServerBehavior::Refuse(message) => return Err(ParleyError::Mcp(message)),
            ServerBehavior::Hang => return std::future::pending().await,
            ServerBehavior::Panic => panic!("server {} exploded", spec.name),
            ServerBehavior::EmptyCapabilities => (Listing::Tools(Vec::new()), true, Some(json!({}))),
            ServerBehavior::Dead => (Listing::Tools(Vec::new()), false, None),
            ServerBehavior::ListToolsFails(message) => (Listing::Fail(message), true, ready),
            ServerBehavior::ListToolsHangs { delay } => {
                tokio::time::sleep(delay).await;
                (Listing::Hang, true, ready)
            }
        };

        self.completed.lock().unwrap().push(spec.name.clone());
        Ok(Arc::new(MockSession {
            server: spec.name.clone(),
            listing,
            alive,
            capabilities,
            calls: Arc::clone(&self.calls),
            closed: Arc::clone(&self.closed),
        }))
    }
}

pub struct MockSession {
    server: String,
    listing: Listing,
    alive: bool,
    capabilities: Option<serde_json::Value>,
    calls: Arc<Mutex<Vec<(String, String, serde_json::Value)>>>,
    closed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl McpSession for MockSession {
    fn is_alive(&self) -> bool {
        self.alive
    }

    fn capabilities(&self) -> Option<serde_json::Value> {
        self.capabilities.clone()
    }

    async fn list_tools(&self) -> Result<Vec<McpToolSchema>> {
        let tools = match &self.listing {
            Listing::Tools(tools) => tools,
            Listing::Fail(message) => return Err(ParleyError::Mcp(message.clone())),
            Listing::Hang => return std::future::pending().await,
        };
        Ok(tools
            .iter()
            .map(|name| {
                McpToolSchema {
                    name: name.clone(),
                    description: Some(format!("{name} from {}", self.server)),
                    input_schema: json!({ "type": "object", "properties": { "q": { "type": "string" } } }),
                }
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<serde_json::Value> {
        self.calls
            .lock()
            .unwrap()
            .push((self.server.clone(), name.to_string(), arguments));
        Ok(json!(format!("{} handled {name}", self.server)))
    }

    async fn close(&self) {
        self.closed.lock().unwrap().push(self.server.clone());
    }
}
