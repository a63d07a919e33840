//! Model provider trait and implementations.

pub mod anthropic;
pub mod http;
pub mod openai;

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::error::ParleyError;
use crate::models::{ModelRef, ProviderKey};
use crate::types::{FinishReason, GenerationSettings, Message, ToolCall, Usage};

/// A request sent to a model provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub messages: Vec<Message>,
    pub settings: GenerationSettings,
    pub tools: Option<Vec<ToolDefinition>>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Response from a provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub text: String,
    pub usage: Usage,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<FinishReason>,
}

/// Core trait implemented by all model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai", "ollama").
    fn provider_name(&self) -> &str;
    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Generate a complete response.
    async fn generate_text(&self, request: &ProviderRequest)
        -> Result<ProviderResponse, ParleyError>;
}

/// Create a provider for the given model, using the provided config.
///
/// The config is read, never written; callers hand each model context its own
/// clone so endpoint overrides stay local to that context.
pub fn create_provider(
    model: &ModelRef,
    config: &ProviderConfig,
) -> Result<Box<dyn ModelProvider>, ParleyError> {
    let key = model.provider;
    let name = key.as_str();

    let base_url = config
        .get_base_url(name)
        .or_else(|| key.default_base_url().map(str::to_string))
        .ok_or_else(|| {
            ParleyError::Configuration(format!("No base URL configured for provider '{name}'"))
        })?;

    let api_key = match config.get_api_key(name) {
        Some(k) => k,
        None if !key.requires_api_key() => String::new(),
        // Custom gateways without a key are usually local proxies.
        None if key == ProviderKey::OpenAiCompatible => String::new(),
        None => {
            return Err(ParleyError::Authentication(format!(
                "Missing API key for provider '{name}'"
            )))
        }
    };

    match key {
        ProviderKey::Anthropic => Ok(Box::new(anthropic::AnthropicProvider::new(
            model.model_id.clone(),
            api_key,
            base_url,
        ))),
        _ => Ok(Box::new(openai::OpenAiProvider::new(
            name,
            model.model_id.clone(),
            api_key,
            base_url,
        ))),
    }
}
