//! Convenience re-exports for common use.

pub use crate::chat::{ChatDispatcher, DispatchPrompt, DispatchResponse, ModelContext, PromptInput};
pub use crate::checkpoint::{CheckpointStore, History};
pub use crate::config::{AppConfig, ProviderConfig};
pub use crate::error::{ParleyError, Result};
pub use crate::mcp::{McpConnector, McpSession, ServerSpec};
pub use crate::models::{ModelSelector, ModelSpec};
pub use crate::provider::ModelProvider;
pub use crate::session::{Session, SessionOptions};
pub use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolArguments, ToolPipeline};
pub use crate::types::{GenerationSettings, Message, Role, Usage};
