//! Configuration: provider credentials (env > file) and the TOML app config.

pub mod file;

pub use file::{AppConfig, GenerationSection, McpSection, ModelEntry, ProviderEntry, ToolsSection};

use std::collections::HashMap;

use crate::models::ProviderKey;

/// Provider credentials and endpoints.
///
/// This is a plain value: cloning it yields a fully independent copy, so each
/// model context can hold its own snapshot and pointing one context at a
/// local endpoint never leaks into another context's settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    api_keys: HashMap<String, String>,
    base_urls: HashMap<String, String>,
}

impl ProviderConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables (OPENAI_API_KEY, ANTHROPIC_API_KEY, etc.).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::new();

        let env_mappings = [
            ("OPENAI_API_KEY", ProviderKey::OpenAi),
            ("OPENAI_COMPAT_API_KEY", ProviderKey::OpenAiCompatible),
            ("ANTHROPIC_API_KEY", ProviderKey::Anthropic),
            ("GROQ_API_KEY", ProviderKey::Groq),
            ("OPENROUTER_API_KEY", ProviderKey::OpenRouter),
        ];

        for (env_var, provider) in env_mappings {
            if let Ok(key) = std::env::var(env_var) {
                config.set_api_key(provider.as_str(), key);
            }
        }

        let url_mappings = [
            ("OPENAI_BASE_URL", ProviderKey::OpenAi),
            ("OPENAI_COMPAT_BASE_URL", ProviderKey::OpenAiCompatible),
            ("ANTHROPIC_BASE_URL", ProviderKey::Anthropic),
            ("OLLAMA_BASE_URL", ProviderKey::Ollama),
            ("LMSTUDIO_BASE_URL", ProviderKey::LmStudio),
        ];

        for (env_var, provider) in url_mappings {
            if let Ok(url) = std::env::var(env_var) {
                config.set_base_url(provider.as_str(), url);
            }
        }

        config
    }

    /// Layer `[providers.*]` entries from the config file on top of this
    /// config. Environment values win over file values.
    pub fn merge_file_entries(&mut self, entries: &HashMap<String, ProviderEntry>) {
        for (name, entry) in entries {
            let key = ProviderKey::parse(name)
                .map(|k| k.as_str().to_string())
                .unwrap_or_else(|| name.clone());
            if let Some(api_key) = &entry.api_key {
                self.api_keys.entry(key.clone()).or_insert_with(|| api_key.clone());
            }
            if let Some(base_url) = &entry.base_url {
                self.base_urls.entry(key).or_insert_with(|| base_url.clone());
            }
        }
    }

    pub fn set_api_key(&mut self, provider: &str, key: String) {
        self.api_keys.insert(provider.to_string(), key);
    }

    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        self.api_keys.get(provider).cloned()
    }

    pub fn set_base_url(&mut self, provider: &str, url: String) {
        self.base_urls.insert(provider.to_string(), url);
    }

    pub fn get_base_url(&self, provider: &str) -> Option<String> {
        self.base_urls.get(provider).cloned()
    }

    /// Check if a provider has an API key configured.
    pub fn has_credentials(&self, provider: &str) -> bool {
        self.api_keys.contains_key(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_are_independent() {
        let mut shared = ProviderConfig::new();
        shared.set_base_url("openai", "https://api.openai.com/v1".into());

        let mut local = shared.clone();
        local.set_base_url("openai", "http://localhost:11434/v1".into());

        assert_eq!(
            shared.get_base_url("openai").as_deref(),
            Some("https://api.openai.com/v1")
        );
        assert_eq!(
            local.get_base_url("openai").as_deref(),
            Some("http://localhost:11434/v1")
        );
    }

    #[test]
    fn file_entries_do_not_override_existing_values() {
        let mut config = ProviderConfig::new();
        config.set_api_key("openai", "env-key".into());

        let mut entries = HashMap::new();
        entries.insert(
            "openai".to_string(),
            ProviderEntry {
                api_key: Some("file-key".into()),
                base_url: Some("http://proxy.local/v1".into()),
            },
        );
        entries.insert(
            "claude".to_string(),
            ProviderEntry {
                api_key: Some("anthropic-file-key".into()),
                base_url: None,
            },
        );
        config.merge_file_entries(&entries);

        assert_eq!(config.get_api_key("openai").as_deref(), Some("env-key"));
        assert_eq!(
            config.get_base_url("openai").as_deref(),
            Some("http://proxy.local/v1")
        );
        assert_eq!(
            config.get_api_key("anthropic").as_deref(),
            Some("anthropic-file-key")
        );
    }
}
