//! Multi-model chat: per-model contexts, dispatch and reduction.

pub mod context;
pub mod dispatcher;
pub mod format;
pub mod roles;

pub use context::{ChatReply, ModelContext, PromptInput};
pub use dispatcher::{ChatDispatcher, DispatchPrompt, DispatchResponse};
pub use format::{ModelMetrics, ModelOutcome};
pub use roles::{FileRoleLoader, RoleLoader};
