//! Codex CLI adapter.
//!
//! Drives the `codex` binary as a subprocess: JSON-Lines output is forced,
//! interactive approvals are disabled, the prompt travels on stdin, and the
//! emitted event stream is folded into a single response. One subprocess
//! per invocation, never reused.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use picoclaw_core::{Message, Role};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::provider::{ChatProvider, ChatRequest, LlmResponse, ProviderError, Usage};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Chat provider backed by the `codex` CLI.
pub struct CodexCliProvider {
    binary: String,
    workdir: PathBuf,
    timeout: Duration,
}

impl CodexCliProvider {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "codex".into(),
            workdir: workdir.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ChatProvider for CodexCliProvider {
    async fn chat(
        &self,
        ctx: CancellationToken,
        req: &ChatRequest,
        model: &str,
    ) -> Result<LlmResponse, ProviderError> {
        let prompt = render_prompt(&req.messages);

        let mut cmd = Command::new(&self.binary);
        cmd.arg("exec")
            .arg("--json")
            .arg("--dangerously-bypass-approvals-and-sandbox")
            .arg("--skip-git-repo-check")
            .args(["--color", "never"]);
        if !model.is_empty() {
            cmd.args(["--model", model]);
        }
        cmd.arg("-C")
            .arg(&self.workdir)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(binary = %self.binary, model, "spawning codex subprocess");
        let mut child = cmd.spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::Protocol("failed to open codex stdin".into()))?;
        stdin.write_all(prompt.as_bytes()).await?;
        drop(stdin);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::Protocol("failed to capture codex stdout".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProviderError::Protocol("failed to capture codex stderr".into()))?;

        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut lines = BufReader::new(stdout).lines();
        let mut collected = String::new();

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    let _ = child.start_kill();
                    return Err(ProviderError::Cancelled);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    let _ = child.start_kill();
                    return Err(ProviderError::DeadlineExceeded(self.timeout));
                }
                line = lines.next_line() => match line? {
                    Some(line) => {
                        collected.push_str(&line);
                        collected.push('\n');
                    }
                    None => break,
                },
            }
        }

        let mut stderr_buf = String::new();
        let _ = stderr.read_to_string(&mut stderr_buf).await;
        let status = child.wait().await?;

        if !status.success() && collected.trim().is_empty() {
            return Err(ProviderError::Protocol(format!(
                "codex exited with {status}: {}",
                stderr_buf.trim()
            )));
        }
        if !stderr_buf.trim().is_empty() {
            warn!(stderr = %stderr_buf.trim(), "codex wrote diagnostics to stderr");
        }

        parse_jsonl_events(&collected)
    }
}

/// Render the conversation into the single prompt codex reads from stdin.
fn render_prompt(messages: &[Message]) -> String {
    let mut parts = Vec::new();
    for msg in messages {
        let text = msg.text_content();
        if text.is_empty() {
            continue;
        }
        match msg.role {
            Role::System => parts.push(format!("[system]\n{text}")),
            Role::Assistant => parts.push(format!("[assistant]\n{text}")),
            Role::User | Role::Tool => parts.push(text),
        }
    }
    parts.join("\n\n")
}

#[derive(Debug, Deserialize)]
struct CliEvent {
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    usage: Option<CliUsage>,
    #[serde(default)]
    item: Option<CliItem>,
}

#[derive(Debug, Deserialize)]
struct CliItem {
    #[serde(rename = "type", default)]
    item_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CliUsage {
    #[serde(default, alias = "prompt_tokens")]
    input_tokens: u32,
    #[serde(default, alias = "completion_tokens")]
    output_tokens: u32,
}

/// Fold a JSON-Lines event stream into one response.
///
/// Text is concatenated from completed-item agent messages and from flat
/// text events; usage accumulates across events. Unparseable lines are
/// ignored — the CLI interleaves diagnostics with events.
pub(crate) fn parse_jsonl_events(output: &str) -> Result<LlmResponse, ProviderError> {
    let mut content = String::new();
    let mut usage: Option<Usage> = None;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || !line.starts_with('{') {
            continue;
        }
        let Ok(event) = serde_json::from_str::<CliEvent>(line) else {
            continue;
        };

        if let Some(text) = &event.text {
            content.push_str(text);
        } else if event.event_type == "item.completed" {
            if let Some(item) = &event.item {
                if item.item_type == "agent_message" {
                    if let Some(text) = &item.text {
                        content.push_str(text);
                    }
                }
            }
        }

        if let Some(u) = &event.usage {
            let total = usage.get_or_insert(Usage::default());
            total.accumulate(&Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            });
        }
    }

    Ok(LlmResponse {
        content,
        tool_calls: vec![],
        finish_reason: "stop".into(),
        usage,
    })
}
