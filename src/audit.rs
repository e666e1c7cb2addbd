//! Audit log for tool executions
//!
//! Appends one JSON line per `ToolRegistry::execute` call so that what the
//! assistant ran, with which parameters and how it ended, can be reviewed
//! later.

use crate::config::AuditConfig;
use crate::tools::ToolResult;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Session ID for the current process
static SESSION_ID: Lazy<String> = Lazy::new(|| Uuid::new_v4().to_string());

/// Secret patterns for redaction
static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // API keys and tokens
        r#"(?i)(api[_-]?key|token|secret|password|passwd|pwd)\s*[=:]\s*['"]?([^'"\s]+)['"]?"#,
        // Bearer tokens
        r"(?i)bearer\s+[a-zA-Z0-9._-]+",
        // AWS keys
        r"AKIA[A-Z0-9]{16}",
        // Private keys
        r"-----BEGIN\s+(?:RSA\s+)?PRIVATE\s+KEY-----",
        // Generic long alphanumeric strings that might be keys
        r"[a-zA-Z0-9_-]{32,}",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Parameter names whose values are always hidden
const SECRET_KEYS: &[&str] = &["token", "api_key", "apikey", "password", "secret"];

/// Log entry structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub tool: String,
    pub params: Value,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Types of audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    /// Tool ran and reported success
    Execute,
    /// Tool ran and reported failure
    Failed,
    /// No tool with that name
    UnknownTool,
}

/// Logger for tool execution auditing
pub struct AuditLogger {
    config: AuditConfig,
    log_file: Mutex<Option<BufWriter<File>>>,
}

impl AuditLogger {
    /// Create a new audit logger
    pub fn new(config: AuditConfig) -> Self {
        let log_file = if config.enabled {
            Self::open_log_file(&config.log_path)
        } else {
            None
        };

        Self {
            config,
            log_file: Mutex::new(log_file),
        }
    }

    /// Open or create the log file
    fn open_log_file(path: &Path) -> Option<BufWriter<File>> {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create audit log directory: {}", e);
                return None;
            }
        }

        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                error!("Failed to open audit log {:?}: {}", path, e);
                None
            }
        }
    }

    /// Record one tool execution
    pub fn record(
        &self,
        event: AuditEvent,
        tool: &str,
        params: &Value,
        result: &ToolResult,
        elapsed: Duration,
    ) {
        if !self.config.enabled {
            return;
        }

        let entry = AuditEntry {
            session_id: SESSION_ID.clone(),
            timestamp: Utc::now(),
            event,
            tool: tool.to_string(),
            params: self.redact_params(params),
            success: result.success,
            error: result.error.as_deref().map(|e| self.redact_if_needed(e)),
            duration_ms: elapsed.as_millis() as u64,
        };

        self.maybe_rotate();
        self.write_entry(&entry);
    }

    /// Write a log entry
    fn write_entry(&self, entry: &AuditEntry) {
        let mut guard = self.log_file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ref mut file) = *guard {
            match serde_json::to_string(entry) {
                Ok(json) => {
                    if let Err(e) = writeln!(file, "{}", json) {
                        error!("Failed to write audit entry: {}", e);
                    }
                    if let Err(e) = file.flush() {
                        warn!("Failed to flush audit log: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to serialize audit entry: {}", e);
                }
            }
        }
    }

    /// Redact secrets from text if configured
    fn redact_if_needed(&self, text: &str) -> String {
        if self.config.redact_secrets {
            redact_secrets(text)
        } else {
            text.to_string()
        }
    }

    fn redact_params(&self, params: &Value) -> Value {
        if self.config.redact_secrets {
            redact_value(params)
        } else {
            params.clone()
        }
    }

    /// Rotate the log file once it grows past the configured size
    fn maybe_rotate(&self) {
        let path = &self.config.log_path;
        let too_big = fs::metadata(path)
            .map(|m| m.len() > self.config.max_log_size)
            .unwrap_or(false);
        if !too_big {
            return;
        }

        debug!("Rotating audit log");
        let mut guard = self.log_file.lock().unwrap_or_else(|e| e.into_inner());

        // Close current file
        *guard = None;

        for i in (1..self.config.log_retention).rev() {
            let old = format!("{}.{}", path.display(), i);
            let new = format!("{}.{}", path.display(), i + 1);
            let _ = fs::rename(&old, &new);
        }

        let rotated = format!("{}.1", path.display());
        let _ = fs::rename(path, &rotated);

        *guard = Self::open_log_file(path);
    }

    /// Get session ID
    pub fn session_id() -> &'static str {
        &SESSION_ID
    }
}

/// Redact secrets from text
fn redact_secrets(text: &str) -> String {
    let mut result = text.to_string();

    for pattern in SECRET_PATTERNS.iter() {
        result = pattern.replace_all(&result, "[REDACTED]").to_string();
    }

    result
}

/// Redact secrets from every string inside a JSON value
fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_secrets(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let lower = k.to_ascii_lowercase();
                    if SECRET_KEYS.iter().any(|s| lower.contains(s)) {
                        (k.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (k.clone(), redact_value(v))
                    }
                })
                .collect(),
        ),
        other => other.clone(),
    }
}
