use std::collections::HashMap;
use std::sync::Arc;

use picoclaw_core::{PicoError, Tool, ToolCall, ToolExecutor, ToolResult};
use tracing::warn;

/// Registry of tool executors, keyed by the tool names they provide.
///
/// Tool implementations live elsewhere (shell exec, web search, MCP
/// bridges); the registry only routes calls and shapes errors so a failed
/// or unknown tool never aborts the agent loop.
#[derive(Default)]
pub struct ToolRegistry {
    executors: HashMap<String, Arc<dyn ToolExecutor>>,
    definitions: Vec<Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every tool an executor provides.
    pub fn register(&mut self, executor: Arc<dyn ToolExecutor>) {
        for tool in executor.tools() {
            self.executors.insert(tool.name.clone(), Arc::clone(&executor));
            self.definitions.push(tool);
        }
    }

    /// Tool definitions to advertise to the model.
    pub fn definitions(&self) -> Vec<Tool> {
        self.definitions.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Execute a single tool call. Failures come back as error results so
    /// the model can see what went wrong.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let Some(executor) = self.executors.get(&call.tool_name) else {
            warn!(tool = %call.tool_name, "model requested unknown tool");
            return ToolResult {
                tool_call_id: call.id.clone(),
                content: format!("tool not found: {}", call.tool_name),
                is_error: true,
            };
        };

        match executor.execute(call).await {
            Ok(result) => result,
            Err(PicoError::ToolExecution { tool, reason }) => ToolResult {
                tool_call_id: call.id.clone(),
                content: format!("{tool}: {reason}"),
                is_error: true,
            },
            Err(e) => ToolResult {
                tool_call_id: call.id.clone(),
                content: e.to_string(),
                is_error: true,
            },
        }
    }
}
