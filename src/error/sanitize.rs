//! Credential scrubbing for error text.
//!
//! Every message stored in an `ErrorRecord` or returned to a caller passes through
//! `sanitize` first. Messages are also truncated so a provider echoing a large
//! request body cannot bloat the telemetry window.

use regex::Regex;
use std::sync::LazyLock;

const REDACTED: &str = "[REDACTED]";

/// Longest message retained, in characters.
pub const MAX_MESSAGE_CHARS: usize = 512;

static SECRET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Bearer / Basic authorization values
        r"(?i)\b(bearer|basic)\s+[A-Za-z0-9._~+/=-]{8,}",
        // key=value, key: value and quoted JSON pairs for common secret names
        r#"(?i)\b(api[_-]?key|x-api-key|access[_-]?token|token|secret|password|passwd|authorization|key)["']?\s*[:=]\s*["']?[^\s"'&,;]+"#,
        // OpenAI / Anthropic style keys
        r"\bsk-[A-Za-z0-9_-]{8,}",
        // Google API keys
        r"\bAIza[0-9A-Za-z_-]{20,}",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Strip credentials and bound the length of `message`.
pub fn sanitize(message: &str) -> String {
    let mut cleaned = message.to_string();
    for pattern in SECRET_PATTERNS.iter() {
        cleaned = pattern
            .replace_all(&cleaned, |caps: &regex::Captures<'_>| match caps.get(1) {
                Some(name) => format!("{}={}", name.as_str(), REDACTED),
                None => REDACTED.to_string(),
            })
            .into_owned();
    }

    if cleaned.chars().count() > MAX_MESSAGE_CHARS {
        let truncated: String = cleaned.chars().take(MAX_MESSAGE_CHARS).collect();
        return format!("{}…", truncated);
    }
    cleaned
}
