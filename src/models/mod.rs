//! Model slots and provider resolution.

pub mod provider_key;
pub mod selector;

pub use provider_key::ProviderKey;
pub use selector::ModelSelector;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ModelEntry;

/// One configured model slot.
///
/// Two specs are equal iff name, role and instance all match. The same model
/// name may be configured several times; each repeat gets the next 1-based
/// `instance` so `internal_id` stays unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub role: Option<String>,
    pub instance: u32,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            instance: 1,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        let role = role.into();
        self.role = if role.trim().is_empty() { None } else { Some(role) };
        self
    }

    pub fn with_instance(mut self, instance: u32) -> Self {
        self.instance = instance.max(1);
        self
    }

    /// Unique key: `name`, or `name#instance` for repeats.
    pub fn internal_id(&self) -> String {
        if self.instance > 1 {
            format!("{}#{}", self.name, self.instance)
        } else {
            self.name.clone()
        }
    }

    /// Human label: `name`, ` #instance` for repeats, ` (role)` when a role is set.
    pub fn display_name(&self) -> String {
        let mut label = self.name.clone();
        if self.instance > 1 {
            label.push_str(&format!(" #{}", self.instance));
        }
        if let Some(role) = &self.role {
            label.push_str(&format!(" ({role})"));
        }
        label
    }

    /// Resolve the provider and provider-side model id.
    pub fn model_ref(&self) -> ModelRef {
        ModelRef::parse(&self.name)
    }

    /// Build specs from ordered entries, numbering repeated names.
    pub fn from_entries(entries: &[ModelEntry]) -> Vec<ModelSpec> {
        let mut specs: Vec<ModelSpec> = Vec::with_capacity(entries.len());
        for entry in entries {
            let instance = specs.iter().filter(|s| s.name == entry.name).count() as u32 + 1;
            let mut spec = ModelSpec::new(entry.name.clone()).with_instance(instance);
            if let Some(role) = &entry.role {
                spec = spec.with_role(role.clone());
            }
            specs.push(spec);
        }
        specs
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// A resolved `provider/model` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelRef {
    pub provider: ProviderKey,
    pub model_id: String,
}

impl ModelRef {
    /// Parse `provider/model`. Bare names (or unknown prefixes such as
    /// `meta-llama/...`) infer the provider from the model id.
    pub fn parse(name: &str) -> Self {
        if let Some((prefix, rest)) = name.split_once('/') {
            if let Some(provider) = ProviderKey::parse(prefix) {
                return Self {
                    provider,
                    model_id: rest.to_string(),
                };
            }
        }
        Self {
            provider: infer_provider(name),
            model_id: name.to_string(),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider.as_str(), self.model_id)
    }
}

fn infer_provider(model_id: &str) -> ProviderKey {
    if model_id.starts_with("claude") {
        ProviderKey::Anthropic
    } else {
        ProviderKey::OpenAi
    }
}
