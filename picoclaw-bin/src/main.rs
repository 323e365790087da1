use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use picoclaw_config::{ConfigLoader, LoggingConfig};
use picoclaw_core::{Message, Role};
use picoclaw_providers::engine::FallbackEngine;
use picoclaw_providers::{parse_model_ref, CooldownTracker, ModelRef};
use picoclaw_runtime::agent_loop::{AgentLoop, AgentLoopConfig};
use picoclaw_runtime::{build_registry, SessionManager, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "picoclaw", about = "Ultra-lightweight personal AI agent")]
struct Cli {
    /// Path to config.json (default: ~/.picoclaw/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prompt to send through the agent.
    prompt: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> picoclaw_core::Result<()> {
    let loader = ConfigLoader::load(cli.config.as_deref())?;
    let config = loader.get();
    init_tracing(&config.logging);

    let workdir = std::env::current_dir()?;
    let registry = Arc::new(build_registry(&config, &workdir));
    info!(providers = ?registry.names(), "provider registry ready");

    let tracker = Arc::new(CooldownTracker::new());
    let engine = Arc::new(FallbackEngine::new(registry, tracker));

    let defaults = &config.agents.defaults;
    let primary = parse_model_ref(&defaults.model, &defaults.provider).ok_or_else(|| {
        picoclaw_core::PicoError::Config(format!("invalid model {:?}", defaults.model))
    })?;
    let fallbacks: Vec<ModelRef> = defaults
        .model_fallbacks
        .iter()
        .filter_map(|m| parse_model_ref(m, &defaults.provider))
        .collect();

    let agent = AgentLoop::new(
        engine,
        Arc::new(ToolRegistry::new()),
        AgentLoopConfig {
            primary,
            fallbacks,
            max_tokens: Some(defaults.max_tokens),
            temperature: Some(defaults.temperature),
            max_tool_iterations: defaults.max_tool_iterations,
        },
    );

    let prompt = cli.prompt.join(" ");
    if prompt.is_empty() {
        return Err(picoclaw_core::PicoError::Agent(
            "nothing to do: pass a prompt".into(),
        ));
    }

    let sessions = SessionManager::new();
    let session_id = sessions.create().await;
    sessions.record_message(session_id).await;

    let ctx = CancellationToken::new();
    let cancel_on_ctrl_c = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_ctrl_c.cancel();
        }
    });

    let transcript = vec![Message::text(session_id, Role::User, prompt)];
    let reply = agent.run(ctx, session_id, transcript).await?;
    println!("{reply}");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.init(),
    }
}
