use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a provider call failed, as far as the fallback chain is concerned.
///
/// `Overloaded` exists as a classification bucket but is folded into
/// `RateLimit` before it reaches the cooldown tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverReason {
    RateLimit,
    Overloaded,
    Timeout,
    Billing,
    Auth,
    Format,
    Unknown,
}

impl std::fmt::Display for FailoverReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailoverReason::RateLimit => "rate_limit",
            FailoverReason::Overloaded => "overloaded",
            FailoverReason::Timeout => "timeout",
            FailoverReason::Billing => "billing",
            FailoverReason::Auth => "auth",
            FailoverReason::Format => "format",
            FailoverReason::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A classified provider failure.
///
/// Produced by [`crate::classifier::classify_error`]; unclassifiable errors
/// yield no `FailoverError` and are surfaced to the caller directly instead
/// of feeding the tracker.
#[derive(Debug, Clone, Error)]
#[error("{provider}/{model}: {reason}: {detail}")]
pub struct FailoverError {
    pub reason: FailoverReason,
    pub provider: String,
    pub model: String,
    /// HTTP status, when one was extractable from the upstream error.
    pub status: Option<u16>,
    /// Rendering of the wrapped upstream error.
    pub detail: String,
}

impl FailoverError {
    /// Every reason is retriable on another provider except `Format`:
    /// a malformed request will fail the same way everywhere.
    pub fn is_retriable(&self) -> bool {
        self.reason != FailoverReason::Format
    }
}
