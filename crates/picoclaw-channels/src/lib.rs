//! # picoclaw-channels
//!
//! Channel adapter interfaces. Concrete transports (Telegram, Discord, …)
//! plug in behind the [`Channel`] trait; this crate only defines the shapes
//! the runtime relies on, plus the outbound message chunker.

pub mod adapter;
pub mod chunker;

pub use adapter::{Channel, ChannelEvent, IncomingMessage, OutgoingMessage};
pub use chunker::split_message;
