//! # picoclaw-providers
//!
//! The LLM provider invocation layer: a neutral chat request goes in, a
//! response comes out, and everything between — vendor wire protocols,
//! error classification, per-provider cooldown, and the fallback chain —
//! lives here.
//!
//! The pieces compose as follows: [`engine::FallbackEngine`] walks an
//! ordered candidate list, consulting [`cooldown::CooldownTracker`] for
//! availability and [`registry::ProviderRegistry`] for adapters; failed
//! calls are classified by [`classifier::classify_error`] into a
//! [`failover::FailoverError`] that feeds the tracker.

pub mod anthropic;
pub mod classifier;
pub mod codex_cli;
pub mod cooldown;
pub mod engine;
pub mod failover;
pub mod mock;
pub mod model_ref;
pub mod openai;
pub mod provider;
pub mod registry;

pub use classifier::classify_error;
pub use cooldown::{Clock, CooldownTracker, SystemClock};
pub use engine::{ChatError, FallbackEngine};
pub use failover::{FailoverError, FailoverReason};
pub use model_ref::{model_key, normalize_provider, parse_model_ref, ModelRef};
pub use provider::{ChatProvider, ChatRequest, LlmResponse, ProviderError, Usage};
pub use registry::ProviderRegistry;
