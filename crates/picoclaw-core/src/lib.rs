//! # picoclaw-core
//!
//! Core types, traits, and primitives for the PicoClaw personal AI agent
//! runtime. This crate defines the shared vocabulary used by every other
//! crate in the workspace.

pub mod error;
pub mod message;
pub mod routing;
pub mod tool;

pub use error::{PicoError, Result};
pub use message::{Message, MessageContent, Role};
pub use tool::{Tool, ToolCall, ToolExecutor, ToolResult};
