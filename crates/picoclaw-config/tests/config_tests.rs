use std::io::Write;

use picoclaw_config::{ConfigLoader, PicoConfig};

fn write_config(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_apply_when_file_is_missing() {
    let loader = ConfigLoader::load(Some(std::path::Path::new(
        "/nonexistent/picoclaw/config.json",
    )))
    .unwrap();
    let config = loader.get();
    assert_eq!(config.agents.defaults.model, "glm-4.7");
    assert_eq!(config.agents.defaults.max_tokens, 8192);
    assert_eq!(config.agents.defaults.max_tool_iterations, 20);
    assert_eq!(config.agents.defaults.request_timeout_secs, 120);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn partial_file_keeps_defaults_for_missing_fields() {
    let file = write_config(
        r#"{
            "agents": {
                "defaults": {
                    "model": "anthropic/claude-sonnet-4-5",
                    "model_fallbacks": ["openai/gpt-4o", "zhipu/glm-4.7"]
                }
            },
            "providers": {
                "anthropic": {"api_key": "sk-ant-test"}
            }
        }"#,
    );
    let loader = ConfigLoader::load(Some(file.path())).unwrap();
    let config = loader.get();

    assert_eq!(config.agents.defaults.model, "anthropic/claude-sonnet-4-5");
    assert_eq!(
        config.agents.defaults.model_fallbacks,
        vec!["openai/gpt-4o", "zhipu/glm-4.7"]
    );
    // Untouched fields keep their defaults.
    assert_eq!(config.agents.defaults.max_tokens, 8192);
    assert_eq!(config.providers.anthropic.api_key, "sk-ant-test");
    assert!(config.providers.anthropic.is_configured());
    assert!(!config.providers.openai.is_configured());
}

#[test]
fn provider_blocks_parse_full_shape() {
    let file = write_config(
        r#"{
            "providers": {
                "zhipu": {
                    "api_key": "zk",
                    "api_base": "https://open.bigmodel.cn/api/paas/v4",
                    "proxy": "http://127.0.0.1:7890"
                },
                "codex": {"connect_mode": "stdio"}
            }
        }"#,
    );
    let config = ConfigLoader::load(Some(file.path())).unwrap().get();
    assert_eq!(config.providers.zhipu.proxy, "http://127.0.0.1:7890");
    assert_eq!(config.providers.codex.connect_mode, "stdio");
    assert!(config.providers.codex.is_configured());
}

#[test]
fn malformed_json_is_a_config_error() {
    let file = write_config("{ not json");
    let err = ConfigLoader::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("config error"));
}

#[test]
fn validation_rejects_out_of_range_temperature() {
    let config: PicoConfig = serde_json::from_str(
        r#"{"agents": {"defaults": {"temperature": 3.5}}}"#,
    )
    .unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.contains("temperature"));
}

#[test]
fn validation_rejects_zero_max_tokens() {
    let config: PicoConfig =
        serde_json::from_str(r#"{"agents": {"defaults": {"max_tokens": 0}}}"#).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn validation_warns_on_unknown_log_level() {
    let config: PicoConfig =
        serde_json::from_str(r#"{"logging": {"level": "loud"}}"#).unwrap();
    let warnings = config.validate().unwrap();
    assert!(warnings.iter().any(|w| w.field == "logging.level"));
}

#[test]
fn validation_warns_on_bad_connect_mode() {
    let config: PicoConfig = serde_json::from_str(
        r#"{"providers": {"codex": {"connect_mode": "carrier-pigeon"}}}"#,
    )
    .unwrap();
    let warnings = config.validate().unwrap();
    assert!(warnings
        .iter()
        .any(|w| w.field == "providers.codex.connect_mode"));
}

#[test]
fn channel_settings_flatten_extra_keys() {
    let config: PicoConfig = serde_json::from_str(
        r#"{"channels": {"telegram": {"enabled": true, "allow_from": ["123"], "token": "t0k"}}}"#,
    )
    .unwrap();
    let telegram = &config.channels["telegram"];
    assert!(telegram.enabled);
    assert_eq!(telegram.allow_from, vec!["123"]);
    assert_eq!(telegram.settings["token"], "t0k");
}
