//! Mock chat provider for deterministic testing.
//!
//! Returns pre-configured responses without making any HTTP calls.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use picoclaw_core::ToolCall;
use tokio_util::sync::CancellationToken;

use crate::provider::{ChatProvider, ChatRequest, LlmResponse, ProviderError, Usage};

/// A pre-configured outcome from the mock provider.
pub enum MockOutcome {
    Response(LlmResponse),
    Error(Box<dyn Fn() -> ProviderError + Send + Sync>),
}

impl MockOutcome {
    /// A plain text response.
    pub fn text(text: &str) -> Self {
        MockOutcome::Response(LlmResponse {
            content: text.to_string(),
            tool_calls: vec![],
            finish_reason: "stop".into(),
            usage: Some(Usage {
                prompt_tokens: 100,
                completion_tokens: 50,
                total_tokens: 150,
            }),
        })
    }

    /// A tool-call response.
    pub fn tool_call(name: &str, args: serde_json::Value) -> Self {
        MockOutcome::Response(LlmResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: format!("call_{}", uuid::Uuid::new_v4()),
                tool_name: name.to_string(),
                arguments: args,
            }],
            finish_reason: "tool_calls".into(),
            usage: None,
        })
    }

    /// An error whose message drives the classifier.
    pub fn error(msg: &str) -> Self {
        let msg = msg.to_string();
        MockOutcome::Error(Box::new(move || ProviderError::Protocol(msg.clone())))
    }

    /// An arbitrary provider error, rebuilt on each call.
    pub fn error_with(f: impl Fn() -> ProviderError + Send + Sync + 'static) -> Self {
        MockOutcome::Error(Box::new(f))
    }
}

/// A mock provider that pops queued outcomes in order. When the queue is
/// empty it answers with a default text response.
pub struct MockProvider {
    outcomes: Mutex<Vec<MockOutcome>>,
    /// Requests received, for assertions in tests.
    requests: Arc<Mutex<Vec<(String, usize)>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(Vec::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a simple text response.
    pub fn with_response(self, text: &str) -> Self {
        self.outcomes.lock().push(MockOutcome::text(text));
        self
    }

    /// Queue an error response.
    pub fn with_error(self, msg: &str) -> Self {
        self.outcomes.lock().push(MockOutcome::error(msg));
        self
    }

    /// Queue a fully custom outcome.
    pub fn with_outcome(self, outcome: MockOutcome) -> Self {
        self.outcomes.lock().push(outcome);
        self
    }

    /// Handle on the recorded (model, message-count) request log.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<(String, usize)>>> {
        Arc::clone(&self.requests)
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn chat(
        &self,
        _ctx: CancellationToken,
        req: &ChatRequest,
        model: &str,
    ) -> Result<LlmResponse, ProviderError> {
        self.requests
            .lock()
            .push((model.to_string(), req.messages.len()));

        let outcome = {
            let mut outcomes = self.outcomes.lock();
            if outcomes.is_empty() {
                None
            } else {
                Some(outcomes.remove(0))
            }
        };

        match outcome {
            None => Ok(LlmResponse {
                content: "ok".into(),
                finish_reason: "stop".into(),
                ..Default::default()
            }),
            Some(MockOutcome::Response(resp)) => Ok(resp),
            Some(MockOutcome::Error(make)) => Err(make()),
        }
    }
}
