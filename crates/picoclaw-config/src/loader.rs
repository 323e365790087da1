use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::schema::{PicoConfig, ProviderConfig};

/// Loads the PicoClaw configuration and applies environment overrides.
#[derive(Debug)]
pub struct ConfigLoader {
    config: Arc<RwLock<PicoConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > `PICOCLAW_CONFIG` env >
    /// `~/.picoclaw/config.json`.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("PICOCLAW_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".picoclaw")
            .join("config.json")
    }

    /// Load the config from disk, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: Option<&Path>) -> picoclaw_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            serde_json::from_str::<PicoConfig>(&raw).map_err(|e| {
                picoclaw_core::PicoError::Config(format!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            PicoConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(picoclaw_core::PicoError::Config(e));
            }
        }

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> PicoConfig {
        self.config.read().clone()
    }

    /// Path the config was loaded from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply `PICOCLAW_*` environment overrides. Env vars win over the file
    /// for agent defaults; for provider credentials they fill in only when
    /// the file leaves them empty.
    fn apply_env_overrides(mut config: PicoConfig) -> PicoConfig {
        if let Ok(v) = std::env::var("PICOCLAW_AGENTS_DEFAULTS_MODEL") {
            config.agents.defaults.model = v;
        }
        if let Ok(v) = std::env::var("PICOCLAW_AGENTS_DEFAULTS_PROVIDER") {
            config.agents.defaults.provider = v;
        }
        if let Ok(v) = std::env::var("PICOCLAW_AGENTS_DEFAULTS_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                config.agents.defaults.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("PICOCLAW_LOG_LEVEL") {
            config.logging.level = v;
        }

        for (name, provider) in [
            ("ANTHROPIC", &mut config.providers.anthropic),
            ("OPENAI", &mut config.providers.openai),
            ("OPENROUTER", &mut config.providers.openrouter),
            ("GROQ", &mut config.providers.groq),
            ("ZHIPU", &mut config.providers.zhipu),
            ("GEMINI", &mut config.providers.gemini),
            ("NVIDIA", &mut config.providers.nvidia),
            ("OLLAMA", &mut config.providers.ollama),
            ("MOONSHOT", &mut config.providers.moonshot),
            ("DEEPSEEK", &mut config.providers.deepseek),
            ("CODEX", &mut config.providers.codex),
        ] {
            apply_provider_env(name, provider);
        }

        config
    }
}

fn apply_provider_env(name: &str, provider: &mut ProviderConfig) {
    if provider.api_key.is_empty() {
        if let Ok(v) = std::env::var(format!("PICOCLAW_PROVIDERS_{name}_API_KEY")) {
            provider.api_key = v;
        }
    }
    if provider.api_base.is_empty() {
        if let Ok(v) = std::env::var(format!("PICOCLAW_PROVIDERS_{name}_API_BASE")) {
            provider.api_base = v;
        }
    }
}
