use crate::errors::{ReplayError, ReplayWarning};
use crate::runtime::Terminal;
use serde::Serialize;
use serde_json::{json, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
    // Clones share it, so appends from concurrent tasks never interleave.
    write_lock: Arc<Mutex<()>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), ReplayError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ReplayError::io(parent, e))?;
            }
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let mut line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| ReplayError::Io(e.to_string()))?;
        line.push('\n');

        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ReplayError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| ReplayError::io(&self.path, e))
    }
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}

/// Fans progress out to the console and, when configured, a JSONL event log.
///
/// Cloned into every replay task. Failures of the JSONL sink are announced once
/// on stderr and otherwise swallowed so that logging never stops a replay.
#[derive(Clone)]
pub struct Reporter {
    terminal: Arc<dyn Terminal>,
    jsonl: Option<JsonlLogger>,
    jsonl_failed: Arc<AtomicBool>,
}

impl Reporter {
    pub fn new(terminal: Arc<dyn Terminal>, jsonl: Option<JsonlLogger>) -> Self {
        Self {
            terminal,
            jsonl,
            jsonl_failed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn info(&self, event_type: &str, line: &str, payload: Value) {
        let _ = self.terminal.write_line(line);
        self.record("info", event_type, payload);
    }

    pub fn warn(&self, warning: &ReplayWarning) {
        let _ = self.terminal.warn_line(&format!("warning: {warning}"));
        self.record(
            "warn",
            warning.event_type(),
            json!({ "path": warning.path().display().to_string() }),
        );
    }

    pub fn error(&self, event_type: &str, line: &str, payload: Value) {
        let _ = self.terminal.warn_line(line);
        self.record("error", event_type, payload);
    }

    fn record(&self, level: &str, event_type: &str, payload: Value) {
        let Some(logger) = &self.jsonl else {
            return;
        };
        let event = LogEvent {
            level,
            event_type,
            payload,
        };
        if let Err(error) = logger.append(&event) {
            if !self.jsonl_failed.swap(true, Ordering::SeqCst) {
                let _ = self
                    .terminal
                    .warn_line(&format!("event log disabled after write failure: {error}"));
            }
        }
    }
}
