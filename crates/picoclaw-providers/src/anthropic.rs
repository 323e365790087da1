//! Anthropic Messages API adapter.
//!
//! System messages are split out into the dedicated `system` field, tool
//! definitions are reshaped to the native schema, and `stop_reason` is
//! mapped back into the normalized finish set.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use picoclaw_core::{MessageContent, Role, ToolCall};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::provider::{ChatProvider, ChatRequest, LlmResponse, ProviderError, Usage};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Callable source of a refreshable bearer token, consulted per request.
pub type TokenSource = Arc<dyn Fn() -> Result<String, String> + Send + Sync>;

enum Auth {
    /// Static API key sent as `x-api-key`.
    ApiKey(String),
    /// Refreshable OAuth-style token sent as `Authorization: Bearer`.
    Token(TokenSource),
}

/// Anthropic-native provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    auth: Auth,
    base_url: String,
    timeout: Duration,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        Self::builder(api_key).build()
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, ProviderError> {
        Self::builder(api_key).base_url(base_url).build()
    }

    /// Provider backed by a callable token source (refreshable credentials).
    pub fn with_token_source(
        source: TokenSource,
        base_url: Option<String>,
    ) -> Result<Self, ProviderError> {
        let mut builder = Self::builder(String::new()).token_source(source);
        if let Some(base_url) = base_url {
            builder = builder.base_url(base_url);
        }
        builder.build()
    }

    pub fn builder(api_key: String) -> AnthropicBuilder {
        AnthropicBuilder {
            auth: Auth::ApiKey(api_key),
            base_url: DEFAULT_BASE_URL.to_string(),
            proxy: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

pub struct AnthropicBuilder {
    auth: Auth,
    base_url: String,
    proxy: Option<String>,
    timeout: Duration,
}

impl AnthropicBuilder {
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn token_source(mut self, source: TokenSource) -> Self {
        self.auth = Auth::Token(source);
        self
    }

    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.is_empty());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<AnthropicProvider, ProviderError> {
        let mut client = reqwest::Client::builder().timeout(self.timeout);
        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| ProviderError::Protocol(format!("invalid proxy URL {proxy:?}: {e}")))?;
            client = client.proxy(proxy);
        }
        Ok(AnthropicProvider {
            client: client.build()?,
            auth: self.auth,
            base_url: normalize_base_url(&self.base_url),
            timeout: self.timeout,
        })
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    async fn chat(
        &self,
        ctx: CancellationToken,
        req: &ChatRequest,
        model: &str,
    ) -> Result<LlmResponse, ProviderError> {
        let body = build_request_body(req, model);
        debug!(model, "sending Anthropic messages request");

        let mut request = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        request = match &self.auth {
            Auth::ApiKey(key) => request.header("x-api-key", key),
            Auth::Token(source) => {
                let token = source().map_err(|e| {
                    ProviderError::Protocol(format!("oauth token refresh failed: {e}"))
                })?;
                request.header("Authorization", format!("Bearer {token}"))
            }
        };

        let resp = tokio::select! {
            _ = ctx.cancelled() => return Err(ProviderError::Cancelled),
            resp = request.send() => resp.map_err(|e| {
                if e.is_timeout() {
                    ProviderError::DeadlineExceeded(self.timeout)
                } else {
                    ProviderError::Http(e)
                }
            })?,
        };

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ProviderError::Api {
                provider: "anthropic".into(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let data: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::Protocol(format!("failed to unmarshal response: {e}")))?;
        Ok(parse_response(&data))
    }
}

/// A configured base URL may carry the `/v1` suffix; the adapter appends
/// its own path segments.
fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    trimmed
        .strip_suffix("/v1")
        .unwrap_or(trimmed)
        .to_string()
}

/// Marshal the neutral request into the Messages API body.
pub(crate) fn build_request_body(req: &ChatRequest, model: &str) -> Value {
    let mut system_blocks = Vec::new();
    let mut messages = Vec::new();

    for msg in &req.messages {
        match msg.role {
            Role::System => {
                system_blocks.push(json!({"type": "text", "text": msg.text_content()}));
            }
            Role::User => {
                messages.push(json!({
                    "role": "user",
                    "content": msg.text_content(),
                }));
            }
            Role::Assistant => {
                if msg.tool_calls.is_empty() {
                    messages.push(json!({
                        "role": "assistant",
                        "content": msg.text_content(),
                    }));
                } else {
                    let mut blocks: Vec<Value> = Vec::new();
                    let text = msg.text_content();
                    if !text.is_empty() {
                        blocks.push(json!({"type": "text", "text": text}));
                    }
                    for tc in &msg.tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.tool_name,
                            "input": tc.arguments,
                        }));
                    }
                    messages.push(json!({"role": "assistant", "content": blocks}));
                }
            }
            Role::Tool => {
                // Tool results travel as user messages with tool_result blocks.
                let blocks: Vec<Value> = msg
                    .content
                    .iter()
                    .filter_map(|block| match block {
                        MessageContent::ToolResult {
                            tool_call_id,
                            content,
                            is_error,
                        } => Some(json!({
                            "type": "tool_result",
                            "tool_use_id": tool_call_id,
                            "content": content,
                            "is_error": is_error,
                        })),
                        _ => None,
                    })
                    .collect();
                if blocks.is_empty() {
                    messages.push(json!({"role": "user", "content": msg.text_content()}));
                } else {
                    messages.push(json!({"role": "user", "content": blocks}));
                }
            }
        }
    }

    let mut body = json!({
        "model": model,
        "max_tokens": req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": messages,
    });

    if !system_blocks.is_empty() {
        body["system"] = json!(system_blocks);
    }

    if let Some(temperature) = req.temperature {
        body["temperature"] = json!(temperature);
    }

    if !req.tools.is_empty() {
        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect();
        body["tools"] = json!(tools);
    }

    body
}

/// Fold response content blocks into the neutral response.
pub(crate) fn parse_response(data: &Value) -> LlmResponse {
    let blocks = data["content"].as_array();

    let content = blocks
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|b| {
                    if b["type"] == "text" {
                        b["text"].as_str()
                    } else {
                        None
                    }
                })
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let tool_calls: Vec<ToolCall> = blocks
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "tool_use")
                .map(|b| ToolCall {
                    id: b["id"].as_str().unwrap_or("").to_string(),
                    tool_name: b["name"].as_str().unwrap_or("").to_string(),
                    arguments: b["input"].clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    let finish_reason = match data["stop_reason"].as_str() {
        Some("max_tokens") => "length",
        Some("tool_use") => "tool_calls",
        // end_turn, stop_sequence, and anything unknown normalize to stop.
        _ => "stop",
    };

    let usage = data.get("usage").map(|u| {
        let prompt = u["input_tokens"].as_u64().unwrap_or(0) as u32;
        let completion = u["output_tokens"].as_u64().unwrap_or(0) as u32;
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    });

    LlmResponse {
        content,
        tool_calls,
        finish_reason: finish_reason.to_string(),
        usage,
    }
}
