//! Model reference parsing.
//!
//! Model identifiers arrive as free-form `"provider/model"` strings from
//! config and chat commands. Provider names are case-folded and mapped
//! through a fixed alias table so `claude/...` and `anthropic/...` land on
//! the same registry key.

/// A parsed model reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

/// Parse `"anthropic/claude-opus"` into `{provider: "anthropic", model: "claude-opus"}`.
///
/// Without a slash the default provider applies. Whitespace around the
/// separator is trimmed. Empty input, or an empty model after the slash,
/// yields `None`.
pub fn parse_model_ref(raw: &str, default_provider: &str) -> Option<ModelRef> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(idx) = raw.find('/').filter(|&i| i > 0) {
        let provider = normalize_provider(&raw[..idx]);
        let model = raw[idx + 1..].trim();
        if model.is_empty() {
            return None;
        }
        return Some(ModelRef {
            provider,
            model: model.to_string(),
        });
    }

    Some(ModelRef {
        provider: normalize_provider(default_provider),
        model: raw.to_string(),
    })
}

/// Normalize a provider identifier to its canonical form.
pub fn normalize_provider(provider: &str) -> String {
    let p = provider.trim().to_lowercase();

    match p.as_str() {
        "z.ai" | "z-ai" => "zai".to_string(),
        "opencode-zen" => "opencode".to_string(),
        "qwen" => "qwen-portal".to_string(),
        "kimi-code" => "kimi-coding".to_string(),
        "gpt" => "openai".to_string(),
        "claude" => "anthropic".to_string(),
        "glm" => "zhipu".to_string(),
        "google" => "gemini".to_string(),
        _ => p,
    }
}

/// Canonical `"provider/model"` key for deduplication.
pub fn model_key(provider: &str, model: &str) -> String {
    format!(
        "{}/{}",
        normalize_provider(provider),
        model.trim().to_lowercase()
    )
}
