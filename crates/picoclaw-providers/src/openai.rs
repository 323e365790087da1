//! OpenAI-compatible chat completions adapter.
//!
//! Works against OpenAI itself and the long tail of compatible gateways
//! (OpenRouter, Groq, Zhipu, Moonshot, DeepSeek, Ollama, vLLM, …), which
//! is why the model-name quirks live here rather than per vendor.

use std::time::Duration;

use async_trait::async_trait;
use picoclaw_core::{MessageContent, Role, ToolCall};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::provider::{ChatProvider, ChatRequest, LlmResponse, ProviderError, Usage};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI-compatible API provider.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    provider_name: String,
    timeout: Duration,
}

impl OpenAiCompatProvider {
    pub fn new(
        provider_name: impl Into<String>,
        api_key: String,
        api_base: String,
    ) -> Result<Self, ProviderError> {
        Self::builder(provider_name, api_key, api_base).build()
    }

    pub fn builder(
        provider_name: impl Into<String>,
        api_key: String,
        api_base: String,
    ) -> OpenAiCompatBuilder {
        OpenAiCompatBuilder {
            provider_name: provider_name.into(),
            api_key,
            api_base,
            proxy: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct OpenAiCompatBuilder {
    provider_name: String,
    api_key: String,
    api_base: String,
    proxy: Option<String>,
    timeout: Duration,
}

impl OpenAiCompatBuilder {
    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.is_empty());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<OpenAiCompatProvider, ProviderError> {
        let mut client = reqwest::Client::builder().timeout(self.timeout);
        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| ProviderError::Protocol(format!("invalid proxy URL {proxy:?}: {e}")))?;
            client = client.proxy(proxy);
        }
        Ok(OpenAiCompatProvider {
            client: client.build()?,
            api_key: self.api_key,
            api_base: self.api_base.trim_end_matches('/').to_string(),
            provider_name: self.provider_name,
            timeout: self.timeout,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    async fn chat(
        &self,
        ctx: CancellationToken,
        req: &ChatRequest,
        model: &str,
    ) -> Result<LlmResponse, ProviderError> {
        if self.api_base.is_empty() {
            return Err(ProviderError::Protocol("API base not configured".into()));
        }

        let model = normalize_model(model, &self.api_base);
        let body = build_request_body(req, &model);
        debug!(provider = %self.provider_name, model = %model, "sending chat completion request");

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Content-Type", "application/json")
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

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
                provider: self.provider_name.clone(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        parse_response(&bytes)
    }
}

/// Marshal the neutral request into the chat-completions body.
pub(crate) fn build_request_body(req: &ChatRequest, model: &str) -> Value {
    let mut messages = Vec::new();

    for msg in &req.messages {
        match msg.role {
            Role::System => {
                messages.push(json!({
                    "role": "system",
                    "content": msg.text_content(),
                }));
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
                    let tc: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.tool_name,
                                    "arguments": serde_json::to_string(&tc.arguments)
                                        .unwrap_or_default(),
                                }
                            })
                        })
                        .collect();
                    let text = msg.text_content();
                    let content = if text.is_empty() {
                        Value::Null
                    } else {
                        json!(text)
                    };
                    messages.push(json!({
                        "role": "assistant",
                        "content": content,
                        "tool_calls": tc,
                    }));
                }
            }
            Role::Tool => {
                for block in &msg.content {
                    if let MessageContent::ToolResult {
                        tool_call_id,
                        content,
                        ..
                    } = block
                    {
                        messages.push(json!({
                            "role": "tool",
                            "tool_call_id": tool_call_id,
                            "content": content,
                        }));
                    }
                }
            }
        }
    }

    let mut body = json!({
        "model": model,
        "messages": messages,
    });

    if !req.tools.is_empty() {
        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = json!(tools);
        body["tool_choice"] = json!("auto");
    }

    if let Some(max_tokens) = req.max_tokens {
        if uses_max_completion_tokens(model) {
            body["max_completion_tokens"] = json!(max_tokens);
        } else {
            body["max_tokens"] = json!(max_tokens);
        }
    }

    if let Some(temperature) = req.temperature {
        body["temperature"] = json!(forced_temperature(model).unwrap_or(temperature));
    }

    body
}

/// Parse a chat-completions response body into the neutral response.
pub(crate) fn parse_response(body: &[u8]) -> Result<LlmResponse, ProviderError> {
    let data: Value = serde_json::from_slice(body)
        .map_err(|e| ProviderError::Protocol(format!("failed to unmarshal response: {e}")))?;

    let Some(choice) = data["choices"].get(0) else {
        return Ok(LlmResponse {
            finish_reason: "stop".into(),
            ..Default::default()
        });
    };

    let message = &choice["message"];
    let content = message["content"].as_str().unwrap_or("").to_string();

    let tool_calls: Vec<ToolCall> = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .map(|c| {
                    let name = c["function"]["name"].as_str().unwrap_or("").to_string();
                    let raw_args = c["function"]["arguments"].as_str().unwrap_or("");
                    ToolCall {
                        id: c["id"].as_str().unwrap_or("").to_string(),
                        tool_name: name,
                        arguments: decode_tool_arguments(raw_args),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let usage = data
        .get("usage")
        .filter(|u| !u.is_null())
        .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok());

    Ok(LlmResponse {
        content,
        tool_calls,
        // Passed through verbatim: compatible upstreams already emit the
        // normalized stop/length/tool_calls set.
        finish_reason: choice["finish_reason"].as_str().unwrap_or("").to_string(),
        usage,
    })
}

/// Decode a tool-call argument string into an object map.
///
/// An undecodable payload must never break the response; it is preserved
/// under the `raw` key instead.
fn decode_tool_arguments(raw: &str) -> Value {
    if raw.is_empty() {
        return json!({});
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(v) if v.is_object() => v,
        _ => {
            debug!(raw, "failed to decode tool call arguments, keeping raw string");
            json!({ "raw": raw })
        }
    }
}

/// Models that take `max_completion_tokens` instead of `max_tokens`.
fn uses_max_completion_tokens(model: &str) -> bool {
    let m = model.to_lowercase();
    m.contains("glm") || m.contains("o1") || m.contains("gpt-5")
}

/// Kimi k2 models only support temperature=1.
fn forced_temperature(model: &str) -> Option<f32> {
    let m = model.to_lowercase();
    (m.contains("kimi") && m.contains("k2")).then_some(1.0)
}

/// Strip a known gateway prefix from `provider/model` identifiers, unless
/// talking to OpenRouter where the prefix is part of the model id.
fn normalize_model(model: &str, api_base: &str) -> String {
    let Some(idx) = model.find('/') else {
        return model.to_string();
    };

    if api_base.to_lowercase().contains("openrouter.ai") {
        return model.to_string();
    }

    let prefix = model[..idx].to_lowercase();
    match prefix.as_str() {
        "moonshot" | "nvidia" | "groq" | "ollama" | "deepseek" | "google" | "openrouter"
        | "zhipu" => model[idx + 1..].to_string(),
        _ => model.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use picoclaw_core::{Message, Tool};
    use uuid::Uuid;

    fn request_with(messages: Vec<Message>) -> ChatRequest {
        ChatRequest::new(messages).with_options(Some(1024), Some(0.7))
    }

    fn user(text: &str) -> Message {
        Message::text(Uuid::nil(), Role::User, text)
    }

    #[test]
    fn builds_basic_body() {
        let body = build_request_body(&request_with(vec![user("Hello")]), "gpt-4o");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert_eq!(body["max_tokens"], 1024);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn glm_o1_and_gpt5_use_max_completion_tokens() {
        for model in ["glm-4.7", "o1-preview", "gpt-5-codex", "GLM-5"] {
            let body = build_request_body(&request_with(vec![user("hi")]), model);
            assert_eq!(body["max_completion_tokens"], 1024, "model {model}");
            assert!(body.get("max_tokens").is_none(), "model {model}");
        }
        let body = build_request_body(&request_with(vec![user("hi")]), "gpt-4o");
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn kimi_k2_forces_temperature_one() {
        let body = build_request_body(&request_with(vec![user("hi")]), "kimi-k2-instruct");
        assert_eq!(body["temperature"].as_f64().unwrap(), 1.0);

        let body = build_request_body(&request_with(vec![user("hi")]), "kimi-latest");
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn tools_serialize_with_auto_choice() {
        let req = request_with(vec![user("hi")]).with_tools(vec![Tool {
            name: "get_weather".into(),
            description: "Get weather".into(),
            parameters: json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        }]);
        let body = build_request_body(&req, "gpt-4o");
        assert_eq!(body["tools"][0]["function"]["name"], "get_weather");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn assistant_tool_calls_round_trip_as_json_strings() {
        let mut msg = Message::text(Uuid::nil(), Role::Assistant, "");
        msg.tool_calls = vec![ToolCall {
            id: "call_1".into(),
            tool_name: "get_weather".into(),
            arguments: json!({"city": "SF"}),
        }];
        let body = build_request_body(&request_with(vec![user("hi"), msg]), "gpt-4o");
        let tc = &body["messages"][1]["tool_calls"][0];
        assert_eq!(tc["function"]["name"], "get_weather");
        let args: Value = serde_json::from_str(tc["function"]["arguments"].as_str().unwrap()).unwrap();
        assert_eq!(args["city"], "SF");
    }

    #[test]
    fn tool_results_become_tool_role_messages() {
        let msg = Message::tool_result(Uuid::nil(), "call_1", r#"{"temp": 72}"#, false);
        let body = build_request_body(&request_with(vec![user("hi"), msg]), "gpt-4o");
        assert_eq!(body["messages"][1]["role"], "tool");
        assert_eq!(body["messages"][1]["tool_call_id"], "call_1");
    }

    #[test]
    fn model_prefix_stripping() {
        assert_eq!(normalize_model("moonshot/kimi-k2", "https://api.moonshot.cn/v1"), "kimi-k2");
        assert_eq!(normalize_model("groq/llama-3.1", "https://api.groq.com/openai/v1"), "llama-3.1");
        // Unknown prefixes stay.
        assert_eq!(normalize_model("acme/model-x", "https://api.acme.dev/v1"), "acme/model-x");
        // OpenRouter keeps the full id.
        assert_eq!(
            normalize_model("deepseek/deepseek-chat", "https://openrouter.ai/api/v1"),
            "deepseek/deepseek-chat"
        );
        assert_eq!(normalize_model("gpt-4o", "https://api.openai.com/v1"), "gpt-4o");
    }

    #[test]
    fn parses_response_with_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": "",
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"city\": \"SF\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
        });
        let resp = parse_response(body.to_string().as_bytes()).unwrap();
        assert_eq!(resp.finish_reason, "tool_calls");
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].arguments["city"], "SF");
        assert_eq!(resp.usage.unwrap().total_tokens, 30);
    }

    #[test]
    fn undecodable_tool_arguments_keep_raw() {
        assert_eq!(
            decode_tool_arguments("not json at all"),
            json!({"raw": "not json at all"})
        );
        assert_eq!(decode_tool_arguments("[1, 2]"), json!({"raw": "[1, 2]"}));
        assert_eq!(decode_tool_arguments(""), json!({}));
        assert_eq!(decode_tool_arguments("{\"a\": 1}"), json!({"a": 1}));
    }

    #[test]
    fn empty_choices_default_to_stop() {
        let resp = parse_response(br#"{"choices": []}"#).unwrap();
        assert_eq!(resp.finish_reason, "stop");
        assert!(resp.content.is_empty());
    }
}
