//! Routing identifiers.
//!
//! Agent and account ids arrive from chat channels in whatever shape the
//! transport produces (mixed case, spaces, emoji). Everything downstream
//! keys sessions and bindings on the normalized form.

use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_AGENT_ID: &str = "main";
pub const DEFAULT_ACCOUNT_ID: &str = "default";
pub const MAX_ID_LENGTH: usize = 64;

static VALID_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,63}$").unwrap());
static INVALID_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_-]+").unwrap());

/// Sanitize an agent id to `[a-z0-9][a-z0-9_-]{0,63}`.
///
/// Invalid character runs collapse to `-`, leading/trailing dashes are
/// stripped, and empty input falls back to [`DEFAULT_AGENT_ID`].
pub fn normalize_agent_id(id: &str) -> String {
    normalize_id(id, DEFAULT_AGENT_ID)
}

/// Sanitize an account id. Empty input falls back to [`DEFAULT_ACCOUNT_ID`].
pub fn normalize_account_id(id: &str) -> String {
    normalize_id(id, DEFAULT_ACCOUNT_ID)
}

fn normalize_id(id: &str, fallback: &str) -> String {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    let lower = trimmed.to_lowercase();
    if VALID_ID_RE.is_match(&lower) {
        return lower;
    }
    let mut result = INVALID_CHARS_RE.replace_all(&lower, "-").into_owned();
    result = result.trim_matches('-').to_string();
    if result.len() > MAX_ID_LENGTH {
        result.truncate(MAX_ID_LENGTH);
    }
    if result.is_empty() {
        return fallback.to_string();
    }
    result
}
