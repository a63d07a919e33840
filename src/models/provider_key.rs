//! Typed provider identifiers and alias handling.

/// Canonical provider keys used across model parsing, config, and provider wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKey {
    OpenAi,
    Anthropic,
    Groq,
    Ollama,
    LmStudio,
    OpenRouter,
    OpenAiCompatible,
}

impl ProviderKey {
    /// Canonical provider key string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Groq => "groq",
            Self::Ollama => "ollama",
            Self::LmStudio => "lmstudio",
            Self::OpenRouter => "openrouter",
            Self::OpenAiCompatible => "openai-compatible",
        }
    }

    /// Parse user-facing provider aliases into a typed provider key.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "openai" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "groq" => Some(Self::Groq),
            "ollama" => Some(Self::Ollama),
            "lmstudio" | "lm-studio" => Some(Self::LmStudio),
            "openrouter" => Some(Self::OpenRouter),
            "openai-compatible" | "openai_compatible" => Some(Self::OpenAiCompatible),
            _ => None,
        }
    }

    /// Default API base URL, if the provider has a well-known one.
    pub const fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Anthropic => Some("https://api.anthropic.com/v1"),
            Self::Groq => Some("https://api.groq.com/openai/v1"),
            Self::Ollama => Some("http://localhost:11434/v1"),
            Self::LmStudio => Some("http://localhost:1234/v1"),
            Self::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Self::OpenAiCompatible => None,
        }
    }

    /// Local servers accept requests without an API key.
    pub const fn requires_api_key(self) -> bool {
        !matches!(self, Self::Ollama | Self::LmStudio)
    }
}
