use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration — maps to `config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PicoConfig {
    pub agents: AgentsConfig,
    pub channels: HashMap<String, ChannelConfig>,
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
}

// ── Agents ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub defaults: AgentDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    /// Default provider applied to model names without a `provider/` prefix.
    pub provider: String,
    /// Primary model, e.g. "anthropic/claude-sonnet-4-5" or "glm-4.7".
    pub model: String,
    /// Ordered fallback models tried when the primary is unavailable.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub model_fallbacks: Vec<String>,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tool-call round trips per request before forcing a stop.
    pub max_tool_iterations: u32,
    /// Per-request timeout for provider calls, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            provider: String::new(),
            model: "glm-4.7".into(),
            model_fallbacks: vec![],
            max_tokens: 8192,
            temperature: 0.7,
            max_tool_iterations: 20,
            request_timeout_secs: 120,
        }
    }
}

// ── Channels ───────────────────────────────────────────────────

/// Per-channel settings. Transport protocols are out of scope here; only
/// the shape collaborators rely on is specified.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub enabled: bool,
    /// Allowed sender identifiers (phone numbers, user IDs, etc.)
    pub allow_from: Vec<String>,
    /// Adapter-specific settings (tokens, endpoints, …).
    #[serde(flatten)]
    pub settings: HashMap<String, serde_json::Value>,
}

// ── Providers ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub anthropic: ProviderConfig,
    pub openai: ProviderConfig,
    pub openrouter: ProviderConfig,
    pub groq: ProviderConfig,
    pub zhipu: ProviderConfig,
    pub gemini: ProviderConfig,
    pub nvidia: ProviderConfig,
    pub ollama: ProviderConfig,
    pub moonshot: ProviderConfig,
    pub deepseek: ProviderConfig,
    pub codex: ProviderConfig,
}

impl ProvidersConfig {
    /// Iterate `(canonical name, config)` pairs for registry construction.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ProviderConfig)> {
        [
            ("anthropic", &self.anthropic),
            ("openai", &self.openai),
            ("openrouter", &self.openrouter),
            ("groq", &self.groq),
            ("zhipu", &self.zhipu),
            ("gemini", &self.gemini),
            ("nvidia", &self.nvidia),
            ("ollama", &self.ollama),
            ("moonshot", &self.moonshot),
            ("deepseek", &self.deepseek),
            ("codex", &self.codex),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub api_base: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub proxy: String,
    /// Optional auth scheme, e.g. "oauth" for refreshable tokens.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth_method: String,
    /// `stdio` or `grpc`; only meaningful for subprocess adapters.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub connect_mode: String,
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() || !self.api_base.is_empty() || !self.connect_mode.is_empty()
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl PicoConfig {
    /// Validate the config and return a list of warnings.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        let defaults = &self.agents.defaults;
        if defaults.model.is_empty() {
            warnings.push(ConfigWarning {
                field: "agents.defaults.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
            });
        }

        if !(0.0..=2.0).contains(&defaults.temperature) {
            warnings.push(ConfigWarning {
                field: "agents.defaults.temperature".into(),
                message: format!("temperature {} is out of range 0.0-2.0", defaults.temperature),
                severity: WarningSeverity::Error,
            });
        }

        if defaults.max_tokens == 0 {
            warnings.push(ConfigWarning {
                field: "agents.defaults.max_tokens".into(),
                message: "max_tokens is 0 — the agent cannot produce output".into(),
                severity: WarningSeverity::Error,
            });
        }

        if defaults.max_tool_iterations == 0 {
            warnings.push(ConfigWarning {
                field: "agents.defaults.max_tool_iterations".into(),
                message: "max_tool_iterations is 0 — tool calls would never run".into(),
                severity: WarningSeverity::Warning,
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
            });
        }

        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
            });
        }

        for (name, provider) in self.providers.iter() {
            let mode = provider.connect_mode.as_str();
            if !mode.is_empty() && mode != "stdio" && mode != "grpc" {
                warnings.push(ConfigWarning {
                    field: format!("providers.{name}.connect_mode"),
                    message: format!("unknown connect mode '{mode}' (expected stdio or grpc)"),
                    severity: WarningSeverity::Warning,
                });
            }
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
