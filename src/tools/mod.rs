//! Tool system for function calling.

pub mod arguments;
pub mod builtin;
pub mod filter;
pub mod pipeline;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use filter::{ServerFilter, ToolFilter};
pub use pipeline::{ToolLoadReport, ToolPipeline};
pub use tool::{AgentTool, SharedTool, Tool, ToolOrigin};
pub use types::AgentToolParameters;
