use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// An incoming message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Channel-specific message ID.
    pub id: String,
    /// Channel identifier (e.g., "telegram", "discord").
    pub channel: String,
    /// Sender identifier (channel-specific).
    pub sender: String,
    /// Group/chat identifier (None for DMs).
    pub group: Option<String>,
    /// Text content.
    pub text: Option<String>,
    /// Raw channel-specific metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// An outgoing message to send via a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Target channel.
    pub channel: String,
    /// Target chat/user/group ID.
    pub target: String,
    /// Text content (may contain markdown).
    pub text: String,
    /// Reply to a specific message ID.
    pub reply_to: Option<String>,
}

/// Events emitted by a channel adapter.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A new message arrived.
    Message(IncomingMessage),
    /// The channel connected successfully.
    Connected,
    /// The channel disconnected.
    Disconnected(Option<String>),
}

/// Trait implemented by each channel adapter.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique identifier for this channel instance.
    fn id(&self) -> &str;

    /// Start the channel adapter. Returns a receiver for incoming events.
    async fn start(&mut self) -> picoclaw_core::Result<mpsc::Receiver<ChannelEvent>>;

    /// Send a message through this channel.
    async fn send(&self, message: OutgoingMessage) -> picoclaw_core::Result<()>;

    /// Stop the channel adapter gracefully.
    async fn stop(&mut self) -> picoclaw_core::Result<()>;

    /// Check if the channel is currently connected.
    fn is_connected(&self) -> bool;
}
