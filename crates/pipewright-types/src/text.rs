//! Text helpers for bounded log/notification output.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Maximum length of an error message carried in results and events.
pub const MAX_ERROR_LEN: usize = 200;

/// Maximum length of a single output preview in a `step_completed` event.
pub const MAX_OUTPUT_PREVIEW_LEN: usize = 500;

/// Maximum length of the final-result preview in a `workflow_completed` event.
pub const MAX_FINAL_RESULT_PREVIEW_LEN: usize = 1000;

/// Truncate `text` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

/// Truncate to `max_chars` characters without any marker.
pub fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Bounded textual preview of a value: strings verbatim, everything else as compact JSON.
pub fn preview(value: &Value, max_chars: usize) -> String {
    match value {
        Value::String(s) => truncate(s, max_chars),
        other => truncate(&other.to_string(), max_chars),
    }
}

/// Bound an error message for results and notifications.
pub fn bound_error(message: &str) -> String {
    truncate(message, MAX_ERROR_LEN)
}

/// Timestamp format used in notification payloads (`2025-01-01 12:00:00 UTC`).
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
