//! Provider registry construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use picoclaw_config::{PicoConfig, ProviderConfig};
use picoclaw_providers::anthropic::AnthropicProvider;
use picoclaw_providers::codex_cli::CodexCliProvider;
use picoclaw_providers::openai::OpenAiCompatProvider;
use picoclaw_providers::ProviderRegistry;
use tracing::warn;

/// Default API bases for providers that speak the chat-completions shape.
fn default_api_base(name: &str) -> Option<&'static str> {
    match name {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "zhipu" => Some("https://open.bigmodel.cn/api/paas/v4"),
        "gemini" => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        "nvidia" => Some("https://integrate.api.nvidia.com/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "moonshot" => Some("https://api.moonshot.cn/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        _ => None,
    }
}

/// Build the provider registry from configured credentials.
///
/// Unconfigured providers are simply not registered — the fallback engine
/// treats a missing adapter as an auth failure and moves down the chain.
pub fn build_registry(config: &PicoConfig, workdir: &std::path::Path) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    let timeout = Duration::from_secs(config.agents.defaults.request_timeout_secs);

    for (name, provider_config) in config.providers.iter() {
        if !provider_config.is_configured() {
            continue;
        }

        match name {
            "anthropic" => match build_anthropic(provider_config, timeout) {
                Ok(provider) => registry.register(name, provider),
                Err(e) => warn!(provider = name, error = %e, "skipping provider"),
            },
            "codex" => {
                // Subprocess adapter; only the stdio connect mode exists.
                if provider_config.connect_mode == "grpc" {
                    warn!(provider = name, "grpc connect mode not supported, skipping");
                    continue;
                }
                registry.register(
                    name,
                    Arc::new(CodexCliProvider::new(workdir).with_timeout(timeout)),
                );
            }
            _ => {
                let api_base = if provider_config.api_base.is_empty() {
                    default_api_base(name).unwrap_or_default().to_string()
                } else {
                    provider_config.api_base.clone()
                };
                let built = OpenAiCompatProvider::builder(
                    name,
                    provider_config.api_key.clone(),
                    api_base,
                )
                .proxy(Some(provider_config.proxy.clone()))
                .timeout(timeout)
                .build();
                match built {
                    Ok(provider) => registry.register(name, Arc::new(provider)),
                    Err(e) => warn!(provider = name, error = %e, "skipping provider"),
                }
            }
        }
    }

    registry
}

fn build_anthropic(
    config: &ProviderConfig,
    timeout: Duration,
) -> Result<Arc<AnthropicProvider>, picoclaw_providers::ProviderError> {
    let mut builder = AnthropicProvider::builder(config.api_key.clone())
        .proxy(Some(config.proxy.clone()))
        .timeout(timeout);
    if !config.api_base.is_empty() {
        builder = builder.base_url(config.api_base.clone());
    }
    Ok(Arc::new(builder.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_providers_are_not_registered() {
        let config = PicoConfig::default();
        let registry = build_registry(&config, std::path::Path::new("."));
        assert!(registry.names().is_empty());
    }

    #[test]
    fn configured_providers_register_under_canonical_names() {
        let config: PicoConfig = serde_json::from_str(
            r#"{
                "providers": {
                    "anthropic": {"api_key": "sk-ant"},
                    "zhipu": {"api_key": "zk"},
                    "codex": {"connect_mode": "stdio"}
                }
            }"#,
        )
        .unwrap();
        let registry = build_registry(&config, std::path::Path::new("."));
        assert!(registry.contains("anthropic"));
        assert!(registry.contains("zhipu"));
        assert!(registry.contains("codex"));
        assert!(!registry.contains("openai"));
    }

    #[test]
    fn grpc_connect_mode_is_skipped() {
        let config: PicoConfig = serde_json::from_str(
            r#"{"providers": {"codex": {"connect_mode": "grpc"}}}"#,
        )
        .unwrap();
        let registry = build_registry(&config, std::path::Path::new("."));
        assert!(!registry.contains("codex"));
    }
}
