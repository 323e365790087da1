use std::sync::Arc;

use picoclaw_core::{Message, PicoError, Role};
use picoclaw_providers::engine::FallbackEngine;
use picoclaw_providers::{ChatRequest, ModelRef};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::tools::ToolRegistry;

/// Configuration the loop needs per run.
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    pub primary: ModelRef,
    pub fallbacks: Vec<ModelRef>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub max_tool_iterations: u32,
}

/// Drives the fallback engine through tool-call round trips.
///
/// Each iteration sends the transcript, executes any tool calls the model
/// requested, appends the results, and goes around again — up to
/// `max_tool_iterations` rounds before forcing a stop.
pub struct AgentLoop {
    engine: Arc<FallbackEngine>,
    tools: Arc<ToolRegistry>,
    config: AgentLoopConfig,
}

impl AgentLoop {
    pub fn new(engine: Arc<FallbackEngine>, tools: Arc<ToolRegistry>, config: AgentLoopConfig) -> Self {
        Self {
            engine,
            tools,
            config,
        }
    }

    /// Run one request to completion and return the final assistant text.
    pub async fn run(
        &self,
        ctx: CancellationToken,
        session_id: Uuid,
        mut transcript: Vec<Message>,
    ) -> picoclaw_core::Result<String> {
        let tool_definitions = self.tools.definitions();

        for iteration in 1..=self.config.max_tool_iterations {
            let request = ChatRequest::new(transcript.clone())
                .with_tools(tool_definitions.clone())
                .with_options(self.config.max_tokens, self.config.temperature);

            let response = self
                .engine
                .chat(ctx.clone(), &request, &self.config.primary, &self.config.fallbacks)
                .await
                .map_err(|e| PicoError::Provider(e.to_string()))?;

            if response.tool_calls.is_empty() {
                debug!(iteration, finish_reason = %response.finish_reason, "agent loop finished");
                return Ok(response.content);
            }

            info!(
                iteration,
                tool_calls = response.tool_calls.len(),
                "executing tool calls"
            );

            let mut assistant = Message::text(session_id, Role::Assistant, response.content.clone());
            assistant.tool_calls = response.tool_calls.clone();
            transcript.push(assistant);

            for call in &response.tool_calls {
                if ctx.is_cancelled() {
                    return Err(PicoError::Agent("request cancelled".into()));
                }
                let result = self.tools.dispatch(call).await;
                if result.is_error {
                    warn!(tool = %call.tool_name, error = %result.content, "tool call failed");
                }
                transcript.push(Message::tool_result(
                    session_id,
                    result.tool_call_id,
                    result.content,
                    result.is_error,
                ));
            }
        }

        warn!(
            max = self.config.max_tool_iterations,
            "tool iteration limit reached, forcing a final answer"
        );

        // One last call without tools so the model has to answer in text.
        let request = ChatRequest::new(transcript)
            .with_options(self.config.max_tokens, self.config.temperature);
        let response = self
            .engine
            .chat(ctx, &request, &self.config.primary, &self.config.fallbacks)
            .await
            .map_err(|e| PicoError::Provider(e.to_string()))?;
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use picoclaw_core::{Tool, ToolCall, ToolExecutor, ToolResult};
    use picoclaw_providers::mock::{MockOutcome, MockProvider};
    use picoclaw_providers::{CooldownTracker, ProviderRegistry};
    use serde_json::json;

    struct WeatherExecutor;

    #[async_trait]
    impl ToolExecutor for WeatherExecutor {
        fn tools(&self) -> Vec<Tool> {
            vec![Tool {
                name: "get_weather".into(),
                description: "Get weather".into(),
                parameters: json!({"type": "object"}),
            }]
        }

        async fn execute(&self, call: &ToolCall) -> picoclaw_core::Result<ToolResult> {
            Ok(ToolResult {
                tool_call_id: call.id.clone(),
                content: r#"{"temp": 72}"#.into(),
                is_error: false,
            })
        }
    }

    fn agent_with(provider: Arc<MockProvider>, max_tool_iterations: u32) -> AgentLoop {
        let mut registry = ProviderRegistry::new();
        registry.register("mockai", provider);
        let engine = Arc::new(FallbackEngine::new(
            Arc::new(registry),
            Arc::new(CooldownTracker::new()),
        ));

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(WeatherExecutor));

        AgentLoop::new(
            engine,
            Arc::new(tools),
            AgentLoopConfig {
                primary: ModelRef {
                    provider: "mockai".into(),
                    model: "mock-1".into(),
                },
                fallbacks: vec![],
                max_tokens: Some(1024),
                temperature: Some(0.7),
                max_tool_iterations,
            },
        )
    }

    fn transcript(text: &str) -> Vec<Message> {
        vec![Message::text(Uuid::nil(), Role::User, text)]
    }

    #[tokio::test]
    async fn plain_response_returns_directly() {
        let provider = Arc::new(MockProvider::new().with_response("just text"));
        let agent = agent_with(provider, 20);

        let reply = agent
            .run(CancellationToken::new(), Uuid::nil(), transcript("hi"))
            .await
            .unwrap();
        assert_eq!(reply, "just text");
    }

    #[tokio::test]
    async fn tool_calls_feed_back_into_the_transcript() {
        let provider = Arc::new(
            MockProvider::new()
                .with_outcome(MockOutcome::tool_call("get_weather", json!({"city": "SF"})))
                .with_response("It is 72F in SF."),
        );
        let agent = agent_with(provider.clone(), 20);

        let reply = agent
            .run(CancellationToken::new(), Uuid::nil(), transcript("weather?"))
            .await
            .unwrap();

        assert_eq!(reply, "It is 72F in SF.");
        // Second request carried the tool round trip: user + assistant + tool result.
        let requests = provider.recorded_requests();
        let requests = requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].1, 3);
    }

    #[tokio::test]
    async fn iteration_limit_forces_a_final_answer() {
        // The model asks for a tool on every round.
        let provider = Arc::new(
            MockProvider::new()
                .with_outcome(MockOutcome::tool_call("get_weather", json!({})))
                .with_outcome(MockOutcome::tool_call("get_weather", json!({})))
                .with_response("final answer"),
        );
        let agent = agent_with(provider.clone(), 2);

        let reply = agent
            .run(CancellationToken::new(), Uuid::nil(), transcript("loop!"))
            .await
            .unwrap();

        // Two tool rounds hit the limit; the forced no-tools call answers.
        assert_eq!(reply, "final answer");
        assert_eq!(provider.call_count(), 3);
    }
}
