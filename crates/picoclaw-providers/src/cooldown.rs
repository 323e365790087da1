//! Per-provider cooldown tracking.
//!
//! In-memory only — state resets on restart. The tracker is the single
//! piece of mutable shared state in the provider layer and is guarded by
//! one reader/writer lock: queries take the read lock, mutations the write
//! lock. All time reads go through an injectable [`Clock`] so the backoff
//! schedule is testable without sleeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::failover::FailoverReason;

/// Failures older than this reset the counters on the next failure.
const DEFAULT_FAILURE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Default)]
struct CooldownEntry {
    error_count: u32,
    failure_counts: HashMap<FailoverReason, u32>,
    /// Standard cooldown expiry. `None` models the zero instant.
    cooldown_end: Option<Instant>,
    /// Billing-specific disable expiry.
    disabled_until: Option<Instant>,
    disabled_reason: Option<FailoverReason>,
    last_failure: Option<Instant>,
}

/// Tracks per-provider failure counts and cooldown expiries for the
/// fallback chain.
pub struct CooldownTracker {
    entries: RwLock<HashMap<String, CooldownEntry>>,
    failure_window: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CooldownTracker {
    /// Tracker with the default 24 h failure window and the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            failure_window: DEFAULT_FAILURE_WINDOW,
            clock,
        }
    }

    /// Record a failure and set the appropriate cooldown.
    ///
    /// If the previous failure is older than the failure window the
    /// counters reset before this failure is counted. A billing failure
    /// sets the extended disable; everything else sets the standard
    /// cooldown from the total error count.
    pub fn mark_failure(&self, provider: &str, reason: FailoverReason) {
        let mut entries = self.entries.write();
        let now = self.clock.now();
        let entry = entries.entry(provider.to_string()).or_default();

        if let Some(last) = entry.last_failure {
            if now.duration_since(last) > self.failure_window {
                entry.error_count = 0;
                entry.failure_counts.clear();
            }
        }

        entry.error_count += 1;
        *entry.failure_counts.entry(reason).or_insert(0) += 1;
        entry.last_failure = Some(now);

        if reason == FailoverReason::Billing {
            let billing_count = entry.failure_counts[&FailoverReason::Billing];
            entry.disabled_until = Some(now + billing_backoff(billing_count));
            entry.disabled_reason = Some(FailoverReason::Billing);
        } else {
            entry.cooldown_end = Some(now + standard_backoff(entry.error_count));
        }
    }

    /// Reset all counters and cooldowns for a provider.
    pub fn mark_success(&self, provider: &str) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(provider) {
            *entry = CooldownEntry::default();
        }
    }

    /// Whether the provider may be tried right now.
    ///
    /// A missing entry means the provider has never failed and is
    /// available. The billing disable takes precedence (it is the longer
    /// of the two expiries).
    pub fn is_available(&self, provider: &str) -> bool {
        let entries = self.entries.read();
        let Some(entry) = entries.get(provider) else {
            return true;
        };

        let now = self.clock.now();

        if let Some(disabled_until) = entry.disabled_until {
            if now < disabled_until {
                return false;
            }
        }
        if let Some(cooldown_end) = entry.cooldown_end {
            if now < cooldown_end {
                return false;
            }
        }
        true
    }

    /// How long until the provider becomes available; zero if it already is.
    ///
    /// When both expiries lie in the future this is the maximum of the two
    /// deltas: the provider stays unavailable until the later one passes.
    pub fn cooldown_remaining(&self, provider: &str) -> Duration {
        let entries = self.entries.read();
        let Some(entry) = entries.get(provider) else {
            return Duration::ZERO;
        };

        let now = self.clock.now();
        let mut remaining = Duration::ZERO;

        if let Some(disabled_until) = entry.disabled_until {
            if now < disabled_until {
                remaining = remaining.max(disabled_until - now);
            }
        }
        if let Some(cooldown_end) = entry.cooldown_end {
            if now < cooldown_end {
                remaining = remaining.max(cooldown_end - now);
            }
        }
        remaining
    }

    /// Total error count for a provider.
    pub fn error_count(&self, provider: &str) -> u32 {
        self.entries
            .read()
            .get(provider)
            .map(|e| e.error_count)
            .unwrap_or(0)
    }

    /// Failure count for a specific reason.
    pub fn failure_count(&self, provider: &str, reason: FailoverReason) -> u32 {
        self.entries
            .read()
            .get(provider)
            .and_then(|e| e.failure_counts.get(&reason).copied())
            .unwrap_or(0)
    }

    /// The reason a provider is disabled, when a billing disable is active.
    pub fn disabled_reason(&self, provider: &str) -> Option<FailoverReason> {
        self.entries
            .read()
            .get(provider)
            .and_then(|e| e.disabled_reason)
    }
}

/// Standard exponential backoff: `min(1h, 1min · 5^min(n−1, 3))`.
///
/// 1 error → 1 min, 2 → 5 min, 3 → 25 min, 4+ → 1 hour (cap).
fn standard_backoff(error_count: u32) -> Duration {
    let n = error_count.max(1);
    let exp = (n - 1).min(3);
    let backoff = Duration::from_secs(60) * 5u32.pow(exp);
    backoff.min(Duration::from_secs(3600))
}

/// Billing backoff: `min(24h, 5h · 2^min(n−1, 10))`.
///
/// 1 error → 5 h, 2 → 10 h, 3 → 20 h, 4+ → 24 h (cap).
fn billing_backoff(billing_error_count: u32) -> Duration {
    let n = billing_error_count.max(1);
    let exp = (n - 1).min(10);
    let backoff = Duration::from_secs(5 * 3600) * 2u32.pow(exp);
    backoff.min(Duration::from_secs(24 * 3600))
}
