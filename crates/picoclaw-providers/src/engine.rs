//! The fallback engine.
//!
//! Walks an ordered chain of candidate models, skipping providers the
//! cooldown tracker reports unavailable, and feeds every classified failure
//! back into the tracker. Each candidate is attempted at most once per
//! call; the engine itself never sleeps — it either moves to the next
//! candidate or returns.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::classifier::classify_error;
use crate::cooldown::CooldownTracker;
use crate::failover::FailoverReason;
use crate::model_ref::{model_key, ModelRef};
use crate::provider::{ChatRequest, LlmResponse, ProviderError};
use crate::registry::ProviderRegistry;

/// One candidate's outcome, kept for the exhaustion error.
#[derive(Debug, Clone)]
pub enum Attempt {
    /// The provider was skipped because the tracker reported it unavailable.
    Skipped {
        provider: String,
        model: String,
        reason: Option<FailoverReason>,
        retry_in: Duration,
    },
    /// The provider was invoked and failed with a classified reason.
    Failed {
        provider: String,
        model: String,
        reason: FailoverReason,
        retry_in: Duration,
    },
}

impl std::fmt::Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attempt::Skipped {
                provider,
                model,
                reason,
                retry_in,
            } => match reason {
                Some(reason) => write!(
                    f,
                    "{provider}/{model}: {reason}, retry in {}",
                    format_duration(*retry_in)
                ),
                None => write!(
                    f,
                    "{provider}/{model}: in cooldown, retry in {}",
                    format_duration(*retry_in)
                ),
            },
            Attempt::Failed {
                provider,
                model,
                reason,
                retry_in,
            } => write!(
                f,
                "{provider}/{model}: {reason}, retry in {}",
                format_duration(*retry_in)
            ),
        }
    }
}

/// Error returned by [`FallbackEngine::chat`].
#[derive(Debug, Error)]
pub enum ChatError {
    /// The raw provider error, surfaced unchanged: user cancellation,
    /// non-retriable format errors, and unclassifiable errors all
    /// short-circuit the chain.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Every candidate was skipped or failed.
    #[error("all models failed: {}", format_attempts(.attempts))]
    Exhausted { attempts: Vec<Attempt> },
}

fn format_attempts(attempts: &[Attempt]) -> String {
    attempts
        .iter()
        .map(Attempt::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// Orchestrates the primary provider and its ordered fallbacks.
pub struct FallbackEngine {
    registry: Arc<ProviderRegistry>,
    tracker: Arc<CooldownTracker>,
}

impl FallbackEngine {
    pub fn new(registry: Arc<ProviderRegistry>, tracker: Arc<CooldownTracker>) -> Self {
        Self { registry, tracker }
    }

    pub fn tracker(&self) -> &Arc<CooldownTracker> {
        &self.tracker
    }

    /// Run the chat request against the candidate chain.
    ///
    /// Candidates are `[primary] ∪ fallbacks`, deduplicated by canonical
    /// model key with first occurrence winning. Classified retriable
    /// failures mark the provider and continue the chain; the first
    /// unclassifiable or format error is surfaced as-is so latent bugs
    /// don't masquerade as transient failures.
    pub async fn chat(
        &self,
        ctx: CancellationToken,
        req: &ChatRequest,
        primary: &ModelRef,
        fallbacks: &[ModelRef],
    ) -> Result<LlmResponse, ChatError> {
        let candidates = dedup_candidates(primary, fallbacks);
        let mut attempts: Vec<Attempt> = Vec::new();

        for candidate in &candidates {
            let provider_name = candidate.provider.as_str();

            if !self.tracker.is_available(provider_name) {
                let retry_in = self.tracker.cooldown_remaining(provider_name);
                info!(
                    provider = provider_name,
                    model = %candidate.model,
                    retry_in = ?retry_in,
                    "skipping provider in cooldown"
                );
                attempts.push(Attempt::Skipped {
                    provider: provider_name.to_string(),
                    model: candidate.model.clone(),
                    reason: self.tracker.disabled_reason(provider_name),
                    retry_in,
                });
                continue;
            }

            let Some(adapter) = self.registry.get(provider_name) else {
                // No adapter registered means no credentials were configured.
                warn!(
                    provider = provider_name,
                    model = %candidate.model,
                    "no adapter registered, treating as auth failure"
                );
                self.tracker.mark_failure(provider_name, FailoverReason::Auth);
                attempts.push(Attempt::Failed {
                    provider: provider_name.to_string(),
                    model: candidate.model.clone(),
                    reason: FailoverReason::Auth,
                    retry_in: self.tracker.cooldown_remaining(provider_name),
                });
                continue;
            };

            match adapter.chat(ctx.clone(), req, &candidate.model).await {
                Ok(response) => {
                    self.tracker.mark_success(provider_name);
                    return Ok(response);
                }
                Err(err) => {
                    let Some(failover) = classify_error(&err, provider_name, &candidate.model)
                    else {
                        // Unclassifiable (or user-cancelled): surface it now.
                        return Err(ChatError::Provider(err));
                    };
                    if !failover.is_retriable() {
                        // Format errors fail identically everywhere.
                        return Err(ChatError::Provider(err));
                    }

                    let reason = failover.reason;
                    self.tracker.mark_failure(provider_name, reason);
                    let retry_in = self.tracker.cooldown_remaining(provider_name);
                    warn!(
                        provider = provider_name,
                        model = %candidate.model,
                        reason = %reason,
                        error = %err,
                        "provider failed, trying next candidate"
                    );
                    attempts.push(Attempt::Failed {
                        provider: provider_name.to_string(),
                        model: candidate.model.clone(),
                        reason,
                        retry_in,
                    });
                }
            }
        }

        Err(ChatError::Exhausted { attempts })
    }
}

/// `[primary] ∪ fallbacks` deduplicated by canonical model key,
/// preserving first occurrence.
fn dedup_candidates(primary: &ModelRef, fallbacks: &[ModelRef]) -> Vec<ModelRef> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(1 + fallbacks.len());
    for candidate in std::iter::once(primary).chain(fallbacks.iter()) {
        if seen.insert(model_key(&candidate.provider, &candidate.model)) {
            out.push(candidate.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mref(provider: &str, model: &str) -> ModelRef {
        ModelRef {
            provider: provider.into(),
            model: model.into(),
        }
    }

    #[test]
    fn dedup_preserves_first_occurrence() {
        let primary = mref("openai", "gpt-4");
        let fallbacks = [
            mref("anthropic", "claude-3-opus"),
            mref("OpenAI", "GPT-4"),
            mref("gpt", "gpt-4"),
            mref("anthropic", "claude-3-haiku"),
        ];
        let candidates = dedup_candidates(&primary, &fallbacks);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].provider, "openai");
        assert_eq!(candidates[1].provider, "anthropic");
        assert_eq!(candidates[1].model, "claude-3-opus");
        assert_eq!(candidates[2].model, "claude-3-haiku");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(300)), "5m0s");
        assert_eq!(format_duration(Duration::from_secs(5 * 3600)), "5h0m");
    }
}
