//! Fan-out of one user turn to every configured model.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tracing::{debug, warn};

use super::context::{panic_message, ModelContext, PromptInput};
use super::format::{self, ModelMetrics, ModelOutcome};
use super::roles::RoleLoader;
use crate::error::{ParleyError, Result};
use crate::models::ModelSpec;
use crate::tools::SharedTool;

/// A turn's prompt: shared by all models unless a model has its own variant.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPrompt {
    pub shared: PromptInput,
    /// Per-model variants keyed by internal id.
    pub per_model: HashMap<String, PromptInput>,
}

impl DispatchPrompt {
    pub fn new(shared: impl Into<PromptInput>) -> Self {
        Self {
            shared: shared.into(),
            per_model: HashMap::new(),
        }
    }

    pub fn with_variant(mut self, internal_id: impl Into<String>, prompt: impl Into<PromptInput>) -> Self {
        self.per_model.insert(internal_id.into(), prompt.into());
        self
    }

    pub fn for_model(&self, internal_id: &str) -> PromptInput {
        self.per_model
            .get(internal_id)
            .unwrap_or(&self.shared)
            .clone()
    }
}

impl From<&str> for DispatchPrompt {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Output of a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    pub content: String,
    pub metrics: Option<Vec<ModelMetrics>>,
}

/// Routes turns to one or many model contexts and reduces the results.
pub struct ChatDispatcher {
    contexts: Vec<ModelContext>,
    consensus: bool,
    roles: Option<Arc<dyn RoleLoader>>,
}

impl ChatDispatcher {
    /// Fails with [`ParleyError::NoModels`] when `contexts` is empty.
    pub fn new(contexts: Vec<ModelContext>) -> Result<Self> {
        if contexts.is_empty() {
            return Err(ParleyError::NoModels);
        }
        Ok(Self {
            contexts,
            consensus: false,
            roles: None,
        })
    }

    pub fn with_consensus(mut self, consensus: bool) -> Self {
        self.consensus = consensus;
        self
    }

    pub fn with_role_loader(mut self, loader: Arc<dyn RoleLoader>) -> Self {
        self.roles = Some(loader);
        self
    }

    pub fn consensus(&self) -> bool {
        self.consensus
    }

    pub fn set_consensus(&mut self, consensus: bool) {
        self.consensus = consensus;
    }

    pub fn contexts(&self) -> &[ModelContext] {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut [ModelContext] {
        &mut self.contexts
    }

    pub fn specs(&self) -> Vec<ModelSpec> {
        self.contexts.iter().map(|c| c.spec().clone()).collect()
    }

    /// Swap in a new model set. The old set stays when `contexts` is empty.
    pub fn replace_contexts(&mut self, contexts: Vec<ModelContext>) -> Result<()> {
        if contexts.is_empty() {
            return Err(ParleyError::NoModels);
        }
        self.contexts = contexts;
        Ok(())
    }

    /// Give every context the same tool set.
    pub fn attach_tools(&mut self, tools: &[SharedTool]) {
        for context in &mut self.contexts {
            context.set_tools(tools.to_vec());
        }
    }

    /// Send one turn. Model failures are reported inline, never returned.
    pub async fn dispatch(&mut self, prompt: DispatchPrompt) -> DispatchResponse {
        if self.contexts.len() == 1 {
            return self.dispatch_single(&prompt).await;
        }

        let results = self.fan_out(&prompt).await;
        let individual = format::format_individual(&results);
        let metrics = format::collect_metrics(&results);

        if !self.consensus {
            return DispatchResponse {
                content: individual,
                metrics,
            };
        }

        let content = match self.build_consensus(&prompt, &results).await {
            Ok(answer) => format::labeled_block(self.contexts[0].spec(), &answer),
            Err(error) => {
                warn!(error = %error, "Consensus synthesis failed");
                format::consensus_fallback(&error, &individual)
            }
        };
        DispatchResponse { content, metrics }
    }

    async fn dispatch_single(&mut self, prompt: &DispatchPrompt) -> DispatchResponse {
        let roles = self.roles.clone();
        let context = &mut self.contexts[0];
        let spec = context.spec().clone();

        match run_turn(context, prompt, roles.as_deref()).await {
            ModelOutcome::Reply(reply) => {
                let results = [(spec, ModelOutcome::Reply(reply))];
                DispatchResponse {
                    content: results[0].1.content().to_string(),
                    metrics: format::collect_metrics(&results),
                }
            }
            ModelOutcome::Error(message) => DispatchResponse {
                content: message,
                metrics: None,
            },
        }
    }

    /// Chat with every context concurrently; results keep configuration order.
    async fn fan_out(&mut self, prompt: &DispatchPrompt) -> Vec<(ModelSpec, ModelOutcome)> {
        let roles = self.roles.clone();
        let roles = roles.as_deref();

        debug!(models = self.contexts.len(), "Dispatching to models");
        let turns = self.contexts.iter_mut().map(|context| {
            let spec = context.spec().clone();
            async move { (spec, run_turn(context, prompt, roles).await) }
        });
        join_all(turns).await
    }

    async fn build_consensus(
        &self,
        prompt: &DispatchPrompt,
        results: &[(ModelSpec, ModelOutcome)],
    ) -> std::result::Result<String, String> {
        let question = prompt.shared.display_text();
        let synthesis = format::consensus_prompt(&question, results)
            .ok_or_else(|| "no model produced a response".to_string())?;

        let first = &self.contexts[0];
        match AssertUnwindSafe(first.complete_once(&synthesis))
            .catch_unwind()
            .await
        {
            Ok(Ok(reply)) => Ok(reply.content),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(panic_message(&panic)),
        }
    }
}

/// Resolve the model's prompt, inject its role on the first user turn, chat,
/// and turn errors or panics into an inline message.
async fn run_turn(
    context: &mut ModelContext,
    prompt: &DispatchPrompt,
    roles: Option<&dyn RoleLoader>,
) -> ModelOutcome {
    let id = context.internal_id();
    let mut input = prompt.for_model(&id);

    if !context.has_user_turn() {
        if let Some(role) = roles.and_then(|r| r.load(context.spec())) {
            input.prepend(&format!("{role}\n\n"));
        }
    }

    match AssertUnwindSafe(context.chat(input)).catch_unwind().await {
        Ok(Ok(reply)) => ModelOutcome::Reply(reply),
        Ok(Err(e)) => {
            warn!(model = %id, error = %e, "Model call failed");
            ModelOutcome::Error(format!("Error with {id}: {e}"))
        }
        Err(panic) => {
            let message = panic_message(&panic);
            warn!(model = %id, panic = %message, "Model call panicked");
            ModelOutcome::Error(format!("Error with {id}: {message}"))
        }
    }
}

impl std::fmt::Debug for ChatDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatDispatcher")
            .field("contexts", &self.contexts)
            .field("consensus", &self.consensus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_model_set_is_rejected() {
        let err = ChatDispatcher::new(Vec::new()).err().expect("no models should fail");
        assert!(matches!(err, ParleyError::NoModels));
    }

    #[test]
    fn per_model_variant_overrides_shared_prompt() {
        let prompt = DispatchPrompt::new("shared").with_variant("gpt-4o#2", "special");
        assert_eq!(prompt.for_model("gpt-4o"), PromptInput::from("shared"));
        assert_eq!(prompt.for_model("gpt-4o#2"), PromptInput::from("special"));
    }
}
