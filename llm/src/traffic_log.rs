//! Traffic logging for LLM API calls
//!
//! Every request/response/error is emitted as a `tracing` event under the
//! `traffic` target and, once `enable_file_log` has been called, appended to
//! mentor.log as well.
//! Content is truncated to avoid leaking private data in logs.

use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;

use config::PathManager;

/// Maximum characters to log for content (to protect privacy)
const MAX_CONTENT_LOG_CHARS: usize = 200;

static LOG_FILE: OnceLock<PathBuf> = OnceLock::new();

/// Also append traffic lines to `path`, or to the default log file when `None`.
/// Only the first call has an effect.
pub fn enable_file_log(path: Option<PathBuf>) -> Option<PathBuf> {
    let path = path.or_else(PathManager::log_file_path)?;
    Some(LOG_FILE.get_or_init(|| path).clone())
}

/// Truncate a string for logging, adding ellipsis if truncated
fn truncate_for_log(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}... ({} chars total)", truncated, char_count)
    }
}

fn summarize(value: &impl serde::Serialize) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "<serialization error>".to_string());
    truncate_for_log(&json, MAX_CONTENT_LOG_CHARS)
}

/// Log an LLM request (truncated summary only)
pub fn log_request(model: &str, request: &impl serde::Serialize) {
    log_traffic("REQUEST", model, &summarize(request));
}

/// Log an LLM response (truncated summary only)
pub fn log_response(model: &str, response: &impl serde::Serialize) {
    log_traffic("RESPONSE", model, &summarize(response));
}

/// Log an LLM error
pub fn log_error(model: &str, error: &str) {
    log_traffic("ERROR", model, &truncate_for_log(error, MAX_CONTENT_LOG_CHARS));
}

fn log_traffic(event_type: &str, model: &str, message: &str) {
    tracing::debug!(target: "traffic", event = event_type, model, "{}", message);

    let Some(log_path) = LOG_FILE.get() else {
        return;
    };
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let _ = writeln!(file, "[{}] [TRAFFIC] [LLM] [{}] [{}] {}", timestamp, event_type, model, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate_for_log("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_counts_chars() {
        let s = "é".repeat(12);
        assert_eq!(truncate_for_log(&s, 10), format!("{}... (12 chars total)", "é".repeat(10)));
    }
}
