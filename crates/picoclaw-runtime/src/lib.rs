//! # picoclaw-runtime
//!
//! Ties the provider layer, tools, and sessions together: builds the
//! provider registry from configuration and runs the agent loop that feeds
//! tool results back to the model.

pub mod agent_loop;
pub mod channel_helpers;
pub mod session;
pub mod tools;
pub mod wiring;

pub use agent_loop::AgentLoop;
pub use channel_helpers::handle_incoming;
pub use session::{Session, SessionManager};
pub use tools::ToolRegistry;
pub use wiring::build_registry;
