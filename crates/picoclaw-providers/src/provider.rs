use async_trait::async_trait;
use picoclaw_core::{Message, Tool, ToolCall};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A neutral request to an LLM provider.
///
/// Immutable once dispatched — the engine and adapters take it by shared
/// reference and never modify it.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Conversation history, in order. System messages are allowed anywhere;
    /// adapters that need them split out (Anthropic) handle that themselves.
    pub messages: Vec<Message>,
    /// Tools the model may call.
    pub tools: Vec<Tool>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: vec![],
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_options(mut self, max_tokens: Option<u32>, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }
}

/// A complete response from an LLM provider.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// Assistant text content.
    pub content: String,
    /// Tool calls the model wants executed.
    pub tool_calls: Vec<ToolCall>,
    /// Normalized to `stop`, `length`, or `tool_calls` by the Anthropic and
    /// CLI adapters; the OpenAI-compatible adapter passes upstream values
    /// through verbatim.
    pub finish_reason: String,
    /// Token accounting, when the upstream supplies it.
    pub usage: Option<Usage>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    pub fn accumulate(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A raw error from a provider adapter.
///
/// The `Cancelled` and `DeadlineExceeded` variants are the sentinels the
/// classifier keys on; everything else is classified by message text.
/// `Api`'s Display embeds `Status: NNN` so status extraction from the
/// rendered message matches the same code path as upstream-formatted bodies.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request cancelled")]
    Cancelled,

    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),

    #[error("{provider} API request failed:\n  Status: {status}\n  Body:   {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{0}")]
    Protocol(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The single capability every provider adapter realizes.
///
/// Adapters are stateless apart from their own configuration and HTTP
/// client; the cancellation token must reach the underlying network or
/// subprocess call so an abort surfaces as [`ProviderError::Cancelled`].
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(
        &self,
        ctx: CancellationToken,
        req: &ChatRequest,
        model: &str,
    ) -> Result<LlmResponse, ProviderError>;

    /// Model used when the caller passes an empty model id.
    fn default_model(&self) -> Option<&str> {
        None
    }
}
