//! Glue between channel adapters and the agent loop.

use picoclaw_channels::{split_message, IncomingMessage, OutgoingMessage};
use picoclaw_core::routing::normalize_account_id;
use picoclaw_core::{Message, Role};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::agent_loop::AgentLoop;
use crate::session::SessionManager;

/// Handle one inbound channel message end to end: resolve the session, run
/// the agent, and chunk the reply to the channel's length limit.
///
/// Runs on the session's run lock so concurrent messages to the same chat
/// are processed one at a time.
pub async fn handle_incoming(
    agent: &AgentLoop,
    sessions: &SessionManager,
    ctx: CancellationToken,
    incoming: IncomingMessage,
    max_message_len: usize,
) -> picoclaw_core::Result<Vec<OutgoingMessage>> {
    let Some(text) = incoming.text.filter(|t| !t.trim().is_empty()) else {
        debug!(channel = %incoming.channel, "ignoring message without text");
        return Ok(vec![]);
    };

    let target = incoming
        .group
        .clone()
        .unwrap_or_else(|| incoming.sender.clone());
    let session_key = normalize_account_id(&target);
    let session_id = sessions.find_or_create(&incoming.channel, &session_key).await;

    let lock = sessions.run_lock(session_id).await;
    let _guard = lock.lock().await;
    sessions.record_message(session_id).await;

    let transcript = vec![Message::text(session_id, Role::User, text)];
    let reply = agent.run(ctx, session_id, transcript).await?;

    Ok(split_message(&reply, max_message_len)
        .into_iter()
        .map(|chunk| OutgoingMessage {
            channel: incoming.channel.clone(),
            target: target.clone(),
            text: chunk,
            reply_to: Some(incoming.id.clone()),
        })
        .collect())
}
