//! # picoclaw-config
//!
//! Configuration schema and loader. The config file is JSON at
//! `~/.picoclaw/config.json`; every field has a default so a missing file
//! yields a working configuration.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    AgentDefaults, ChannelConfig, LoggingConfig, PicoConfig, ProviderConfig, ProvidersConfig,
};
