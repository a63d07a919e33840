//! Parley: one prompt, many models.
//!
//! Sends each user turn to several language models concurrently, gives them
//! a shared tool set (local tools plus tools from MCP servers), and keeps
//! named checkpoints of every model's conversation so a session can be
//! rewound.
//!
//! # Quick Start
//!
//! ```no_run
//! use parley::prelude::*;
//!
//! # async fn example() -> parley::error::Result<()> {
//! let specs = vec![ModelSpec::new("openai/gpt-4o"), ModelSpec::new("ollama/llama3.2")];
//! let mut session = Session::new(specs, ProviderConfig::from_env(), SessionOptions::default())?;
//! let reply = session.handle_input("Explain borrowing in one paragraph").await;
//! println!("{}", reply.content);
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod checkpoint;
pub mod config;
pub mod directives;
pub mod error;
pub mod mcp;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
