//! A chat session: models, checkpoints, tools and directives.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::chat::{ChatDispatcher, DispatchPrompt, DispatchResponse, FileRoleLoader, ModelContext};
use crate::checkpoint::CheckpointStore;
use crate::config::{AppConfig, ProviderConfig};
use crate::directives::{self, DirectiveOutput, DirectiveRegistry};
use crate::error::{ParleyError, Result};
use crate::models::{ModelSelector, ModelSpec};
use crate::tools::{ToolLoadReport, ToolPipeline};
use crate::types::GenerationSettings;

/// Builds a bare model context for a spec. Swappable so tests can supply
/// scripted providers.
pub type ContextFactory = Arc<dyn Fn(ModelSpec, &ProviderConfig) -> Result<ModelContext> + Send + Sync>;

pub fn default_context_factory() -> ContextFactory {
    Arc::new(|spec: ModelSpec, config: &ProviderConfig| ModelContext::new(spec, config))
}

/// Settings applied to every model context the session creates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOptions {
    pub system_prompt: Option<String>,
    pub generation: GenerationSettings,
    pub consensus: bool,
    pub roles_dir: Option<PathBuf>,
}

impl SessionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            generation: GenerationSettings::builder()
                .maybe_max_tokens(config.generation.max_tokens)
                .maybe_temperature(config.generation.temperature)
                .build(),
            consensus: config.consensus,
            roles_dir: config.roles_dir.clone(),
        }
    }
}

pub struct Session {
    dispatcher: ChatDispatcher,
    checkpoints: CheckpointStore,
    directives: DirectiveRegistry,
    tools: ToolLoadReport,
    tool_pipeline: Option<ToolPipeline>,
    provider_config: ProviderConfig,
    options: SessionOptions,
    factory: ContextFactory,
    startup_warnings: Vec<String>,
}

impl Session {
    /// Build contexts for `specs` with the default provider factory.
    pub fn new(specs: Vec<ModelSpec>, config: ProviderConfig, options: SessionOptions) -> Result<Self> {
        Self::with_factory(specs, config, options, default_context_factory())
    }

    /// Models that fail to initialize are skipped with a warning; the session
    /// fails with [`ParleyError::NoModels`] only when none succeed.
    pub fn with_factory(
        specs: Vec<ModelSpec>,
        config: ProviderConfig,
        options: SessionOptions,
        factory: ContextFactory,
    ) -> Result<Self> {
        let (contexts, startup_warnings) = build_contexts(&specs, &config, &options, &factory);
        let mut dispatcher = ChatDispatcher::new(contexts)?.with_consensus(options.consensus);
        if let Some(dir) = &options.roles_dir {
            dispatcher = dispatcher.with_role_loader(Arc::new(FileRoleLoader::new(dir)));
        }

        Ok(Self {
            dispatcher,
            checkpoints: CheckpointStore::new(),
            directives: DirectiveRegistry::builtin(),
            tools: ToolLoadReport::default(),
            tool_pipeline: None,
            provider_config: config,
            options,
            factory,
            startup_warnings,
        })
    }

    /// Attach a loaded tool set to every model.
    pub fn with_tools(mut self, report: ToolLoadReport) -> Self {
        self.dispatcher.attach_tools(&report.tools);
        self.tools = report;
        self
    }

    /// Keep the pipeline that produced the current tools so `//tools reload`
    /// can run it again.
    pub fn with_tool_pipeline(mut self, pipeline: ToolPipeline) -> Self {
        self.tool_pipeline = Some(pipeline);
        self
    }

    pub fn dispatcher(&self) -> &ChatDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut ChatDispatcher {
        &mut self.dispatcher
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub fn directives(&self) -> &DirectiveRegistry {
        &self.directives
    }

    pub fn tools(&self) -> &ToolLoadReport {
        &self.tools
    }

    pub fn startup_warnings(&self) -> &[String] {
        &self.startup_warnings
    }

    /// Route a line of input: directives run their handler, anything else is
    /// sent to the models.
    pub async fn handle_input(&mut self, input: &str) -> DispatchResponse {
        if let Some((name, args)) = directives::parse(input) {
            let content = match self.directives.lookup(&name) {
                Some(handler) => match handler(&args, self) {
                    DirectiveOutput::Text(text) => text,
                    DirectiveOutput::ReloadTools => self.reload_tools().await,
                },
                None => directives::unknown_directive(&name),
            };
            return DispatchResponse {
                content,
                metrics: None,
            };
        }
        self.dispatch(DispatchPrompt::new(input)).await
    }

    pub async fn dispatch(&mut self, prompt: DispatchPrompt) -> DispatchResponse {
        self.dispatcher.dispatch(prompt).await
    }

    pub fn checkpoint(&mut self, name: Option<&str>) -> String {
        self.checkpoints
            .checkpoint(name, self.dispatcher.contexts())
            .unwrap_or_else(|e| e.to_string())
    }

    pub fn restore(&mut self, name: Option<&str>) -> String {
        self.checkpoints
            .restore(name, self.dispatcher.contexts_mut())
            .unwrap_or_else(|e| e.to_string())
    }

    pub fn clear(&mut self, keep_system: bool) -> String {
        self.checkpoints.clear(keep_system, self.dispatcher.contexts_mut())
    }

    pub fn review(&self) -> String {
        self.checkpoints
            .review(self.dispatcher.contexts())
            .unwrap_or_else(|e| e.to_string())
    }

    pub fn list_checkpoints(&self) -> String {
        self.checkpoints.list()
    }

    /// Replace the model set from a `name[=role],...` list. The old set
    /// stays when nothing in the new list initializes. Checkpoints are
    /// dropped because they refer to the old models.
    pub fn replace_models(&mut self, raw: &str) -> Result<String> {
        let entries = ModelSelector::parse_list(raw)?;
        let specs = ModelSpec::from_entries(&entries);
        let (contexts, warnings) =
            build_contexts(&specs, &self.provider_config, &self.options, &self.factory);
        if contexts.is_empty() {
            let reasons = if warnings.is_empty() {
                ParleyError::NoModels.to_string()
            } else {
                warnings.join("; ")
            };
            return Err(ParleyError::Configuration(format!("No models could be started: {reasons}")));
        }

        self.dispatcher.replace_contexts(contexts)?;
        self.dispatcher.attach_tools(&self.tools.tools);
        self.checkpoints.reset();

        let mut out = self.describe_models();
        for warning in warnings {
            out.push_str(&format!("\n  skipped: {warning}"));
        }
        Ok(out)
    }

    pub fn describe_models(&self) -> String {
        let names: Vec<String> = self
            .dispatcher
            .specs()
            .iter()
            .map(ModelSpec::display_name)
            .collect();
        format!("Models: {}", names.join(", "))
    }

    pub fn set_consensus(&mut self, on: bool) {
        self.dispatcher.set_consensus(on);
        self.options.consensus = on;
    }

    /// Load tools again, attach them to every model, then close the
    /// previous MCP sessions. Histories and checkpoints are untouched.
    pub async fn reload_tools(&mut self) -> String {
        let Some(pipeline) = &self.tool_pipeline else {
            return "No tool sources to reload".to_string();
        };
        let report = pipeline.load().await;
        self.dispatcher.attach_tools(&report.tools);
        let mut previous = std::mem::replace(&mut self.tools, report);
        previous.connection.shutdown().await;
        info!(tools = self.tools.tools.len(), "Tools reloaded");
        format!("Tools reloaded\n{}", self.tools.describe())
    }

    /// Close MCP sessions.
    pub async fn shutdown(&mut self) {
        self.tools.connection.shutdown().await;
    }
}

fn build_contexts(
    specs: &[ModelSpec],
    config: &ProviderConfig,
    options: &SessionOptions,
    factory: &ContextFactory,
) -> (Vec<ModelContext>, Vec<String>) {
    let mut contexts = Vec::with_capacity(specs.len());
    let mut warnings = Vec::new();

    for spec in specs {
        match factory(spec.clone(), config) {
            Ok(context) => {
                let mut context = context.with_settings(options.generation.clone());
                if let Some(prompt) = &options.system_prompt {
                    context = context.with_system_prompt(prompt.clone());
                }
                contexts.push(context);
            }
            Err(e) => {
                warn!(model = %spec.internal_id(), error = %e, "Model failed to initialize");
                warnings.push(format!("{}: {e}", spec.internal_id()));
            }
        }
    }

    (contexts, warnings)
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dispatcher", &self.dispatcher)
            .field("checkpoints", &self.checkpoints.len())
            .field("tools", &self.tools)
            .finish()
    }
}
