//! Error classification.
//!
//! Maps raw adapter errors onto [`FailoverReason`]s. The pattern catalogue
//! covers every upstream error phrasing observed in production; anything it
//! does not recognize is deliberately left unclassified so logic bugs
//! surface instead of being retried as transient failures.

use std::sync::LazyLock;

use regex::Regex;

use crate::failover::{FailoverError, FailoverReason};
use crate::provider::ProviderError;

/// A single classification pattern: a plain substring or a case-insensitive
/// regex, matched against the lowercased error message.
enum Pattern {
    Substr(&'static str),
    Rx(Regex),
}

impl Pattern {
    fn matches(&self, msg: &str) -> bool {
        match self {
            Pattern::Substr(s) => msg.contains(s),
            Pattern::Rx(re) => re.is_match(msg),
        }
    }
}

fn rx(r: &str) -> Pattern {
    Pattern::Rx(Regex::new(&format!("(?i){r}")).unwrap())
}

fn substr(s: &'static str) -> Pattern {
    Pattern::Substr(s)
}

static RATE_LIMIT_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        rx(r"rate[_ ]limit"),
        substr("too many requests"),
        substr("429"),
        substr("exceeded your current quota"),
        rx(r"exceeded.*quota"),
        rx(r"resource has been exhausted"),
        rx(r"resource.*exhausted"),
        substr("resource_exhausted"),
        substr("quota exceeded"),
        substr("usage limit"),
    ]
});

static OVERLOADED_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        rx(r"overloaded_error"),
        rx(r#""type"\s*:\s*"overloaded_error""#),
        substr("overloaded"),
    ]
});

static TIMEOUT_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        substr("timeout"),
        substr("timed out"),
        substr("deadline exceeded"),
        substr("context deadline exceeded"),
    ]
});

static BILLING_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        rx(r"\b402\b"),
        substr("payment required"),
        substr("insufficient credits"),
        substr("credit balance"),
        substr("plans & billing"),
        substr("insufficient balance"),
    ]
});

static AUTH_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        rx(r"invalid[_ ]?api[_ ]?key"),
        substr("incorrect api key"),
        substr("invalid token"),
        substr("authentication"),
        substr("re-authenticate"),
        substr("oauth token refresh failed"),
        substr("unauthorized"),
        substr("forbidden"),
        substr("access denied"),
        substr("expired"),
        substr("token has expired"),
        rx(r"\b401\b"),
        rx(r"\b403\b"),
        substr("no credentials found"),
        substr("no api key found"),
    ]
});

static FORMAT_PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        substr("string should match pattern"),
        substr("tool_use.id"),
        substr("tool_use_id"),
        substr("messages.1.content.1.tool_use.id"),
        substr("invalid request format"),
    ]
});

static IMAGE_DIMENSION_PATTERNS: LazyLock<Vec<Pattern>> =
    LazyLock::new(|| vec![rx(r"image dimensions exceed max")]);

static IMAGE_SIZE_PATTERNS: LazyLock<Vec<Pattern>> =
    LazyLock::new(|| vec![rx(r"image exceeds.*mb")]);

static STATUS_RES: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)status[:\s]+(\d{3})").unwrap(),
        Regex::new(r"(?i)HTTP[/\s]+\d*\.?\d*\s+(\d{3})").unwrap(),
    ]
});

/// Classify an adapter error into a [`FailoverError`].
///
/// Returns `None` when the error is not classifiable — unknown errors must
/// not trigger fallback — and for user cancellation, which never feeds the
/// tracker.
pub fn classify_error(
    err: &ProviderError,
    provider: &str,
    model: &str,
) -> Option<FailoverError> {
    // User abort: never fall back.
    if matches!(err, ProviderError::Cancelled) {
        return None;
    }

    let make = |reason, status| {
        Some(FailoverError {
            reason,
            provider: provider.to_string(),
            model: model.to_string(),
            status,
            detail: err.to_string(),
        })
    };

    // Deadline expiry: always a timeout, always fallback.
    if matches!(err, ProviderError::DeadlineExceeded(_)) {
        return make(FailoverReason::Timeout, None);
    }
    if let ProviderError::Http(e) = err {
        if e.is_timeout() {
            return make(FailoverReason::Timeout, None);
        }
    }

    let msg = err.to_string().to_lowercase();

    // Image dimension/size errors: non-retriable, non-fallback.
    if is_image_dimension_error(&msg) || is_image_size_error(&msg) {
        return make(FailoverReason::Format, None);
    }

    // HTTP status code extraction takes priority over message patterns.
    if let Some(status) = extract_http_status(&msg) {
        if let Some(reason) = classify_by_status(status) {
            return make(reason, Some(status));
        }
    }

    if let Some(reason) = classify_by_message(&msg) {
        return make(reason, None);
    }

    None
}

/// Map an HTTP status code to a failover reason.
fn classify_by_status(status: u16) -> Option<FailoverReason> {
    match status {
        401 | 403 => Some(FailoverReason::Auth),
        402 => Some(FailoverReason::Billing),
        408 => Some(FailoverReason::Timeout),
        429 => Some(FailoverReason::RateLimit),
        400 => Some(FailoverReason::Format),
        // Transient server-side failures.
        500 | 502 | 503 | 521..=524 | 529 => Some(FailoverReason::Timeout),
        _ => None,
    }
}

/// Match the lowercased message against the pattern buckets.
/// Bucket order is significant.
fn classify_by_message(msg: &str) -> Option<FailoverReason> {
    if matches_any(msg, &RATE_LIMIT_PATTERNS) {
        return Some(FailoverReason::RateLimit);
    }
    if matches_any(msg, &OVERLOADED_PATTERNS) {
        // Overloaded is treated as rate_limit.
        return Some(FailoverReason::RateLimit);
    }
    if matches_any(msg, &BILLING_PATTERNS) {
        return Some(FailoverReason::Billing);
    }
    if matches_any(msg, &TIMEOUT_PATTERNS) {
        return Some(FailoverReason::Timeout);
    }
    if matches_any(msg, &AUTH_PATTERNS) {
        return Some(FailoverReason::Auth);
    }
    if matches_any(msg, &FORMAT_PATTERNS) {
        return Some(FailoverReason::Format);
    }
    None
}

/// Extract an HTTP status code from an error message.
/// Matches `status: 429`, `status 429`, and `HTTP/1.1 502` shapes.
pub fn extract_http_status(msg: &str) -> Option<u16> {
    for re in STATUS_RES.iter() {
        if let Some(caps) = re.captures(msg) {
            if let Ok(status) = caps[1].parse() {
                return Some(status);
            }
        }
    }
    None
}

pub fn is_image_dimension_error(msg: &str) -> bool {
    matches_any(msg, &IMAGE_DIMENSION_PATTERNS)
}

pub fn is_image_size_error(msg: &str) -> bool {
    matches_any(msg, &IMAGE_SIZE_PATTERNS)
}

fn matches_any(msg: &str, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|p| p.matches(msg))
}
