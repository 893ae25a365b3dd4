//! JSONL file writer for structured session/gateway events, used as an
//! optional audit trail alongside `tracing`'s structured logs.
//!
//! Each event is serialized as a single JSON object with a `type` field and
//! a `timestamp`, appended to the file via a buffered writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// JSONL event logger that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlEventLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlEventLogger {
    /// Create a new logger writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("could not create event log directory {}: {}", parent.display(), e);
                return None;
            }
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("could not create event log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self { writer: Mutex::new(BufWriter::new(file)), path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one `{type, timestamp, ...payload}` line. `event_type` becomes
    /// the `type` field; non-object payloads are nested under `data` instead
    /// of being merged.
    pub fn log(&self, event_type: &str, payload: serde_json::Value) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let record = if let serde_json::Value::Object(mut map) = payload {
            map.insert("type".to_string(), serde_json::Value::String(event_type.to_string()));
            map.insert("timestamp".to_string(), serde_json::Value::String(timestamp));
            serde_json::Value::Object(map)
        } else {
            serde_json::json!({"type": event_type, "timestamp": timestamp, "data": payload})
        };

        let Ok(line) = serde_json::to_string(&record) else { return };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{line}");
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlEventLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn writes_valid_jsonl_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let logger = JsonlEventLogger::new(&path).unwrap();

        logger.log("tool_call", serde_json::json!({"tool": "read_file", "args": {"path": "foo.rs"}}));
        logger.log("session_status", serde_json::json!({"sessionId": "s1", "status": "idle"}));
        drop(logger);

        let mut content = String::new();
        File::open(&path).unwrap().read_to_string(&mut content).unwrap();
        let lines: Vec<&str> = content.trim().lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "tool_call");
        assert_eq!(first["tool"], "read_file");
        assert!(first.get("timestamp").is_some());
    }

    #[test]
    fn nests_non_object_payloads_under_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events2.jsonl");
        let logger = JsonlEventLogger::new(&path).unwrap();
        logger.log("simple_event", serde_json::json!("just a string"));
        drop(logger);

        let mut content = String::new();
        File::open(&path).unwrap().read_to_string(&mut content).unwrap();
        let value: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(value["type"], "simple_event");
        assert_eq!(value["data"], "just a string");
    }

    #[test]
    fn invalid_path_returns_none_without_panicking() {
        let result = JsonlEventLogger::new("/nonexistent/deeply/nested/path/file.jsonl");
        let _ = result;
    }
}
