//! Utility modules: retry and text shaping.

pub mod retry;
pub mod text;
