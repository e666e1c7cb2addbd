//! Built-in tools
//!
//! File and shell tools registered by the host at startup, without any
//! plugin involved.

use super::registry::ToolRegistry;
use super::schema::{ParameterSchema, ToolSchema};
use super::types::{Params, Tool, ToolResult};
use crate::config::ToolsConfig;
use crate::error::{RegistryError, ToolError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Commands shell_execute always refuses
static BLOCKED_COMMANDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)rm\s+-rf",
        r"(?i)\bformat\s+[a-z]:", // Windows drive format
        r"(?i)del\s+/f",
        r"(?i)dd\s+if=",
        r":\(\)\s*\{\s*:\|:\s*&\s*\}\s*;\s*:", // Fork bomb
        r"(?i)\bsudo\b",
        r"(?i)\bshutdown\b",
        r"(?i)\breboot\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Limits the built-in tools run under
#[derive(Debug, Clone)]
struct Limits {
    max_read_size: u64,
    max_write_size: u64,
    shell_timeout_ms: u64,
    blocked: Vec<Regex>,
}

/// Built-in tools that don't require plugins
pub struct BuiltinTools {
    limits: Arc<Limits>,
}

impl BuiltinTools {
    pub fn new(config: &ToolsConfig) -> Self {
        let blocked = config
            .blocked_commands
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                // Not a valid regex: match it literally
                Err(_) => Regex::new(&regex::escape(p)).ok(),
            })
            .collect();

        Self {
            limits: Arc::new(Limits {
                max_read_size: config.max_read_size,
                max_write_size: config.max_write_size,
                shell_timeout_ms: config.shell_timeout_ms,
                blocked,
            }),
        }
    }

    /// Names of every built-in tool
    pub fn names() -> [&'static str; 5] {
        ["file_read", "file_write", "file_append", "file_list", "shell_execute"]
    }

    /// Check if a tool is built-in
    pub fn is_builtin(tool_name: &str) -> bool {
        Self::names().contains(&tool_name)
    }

    /// Get all built-in tools
    pub fn tools(&self) -> Vec<Tool> {
        let limits = &self.limits;
        vec![
            Tool::from_fn(
                "file_read",
                format!(
                    "Read the contents of a file. Maximum file size is {} bytes.",
                    limits.max_read_size
                ),
                ToolSchema::object().required_property(
                    "path",
                    ParameterSchema::string("The path to the file to read (relative or absolute)"),
                ),
                {
                    let limits = limits.clone();
                    move |params| read_file(limits.clone(), params)
                },
            ),
            Tool::from_fn(
                "file_write",
                format!(
                    "Write content to a file, creating it if it doesn't exist. Maximum content size is {} bytes.",
                    limits.max_write_size
                ),
                ToolSchema::object()
                    .required_property("path", ParameterSchema::string("The path to the file to write"))
                    .required_property(
                        "content",
                        ParameterSchema::string("The content to write to the file"),
                    ),
                {
                    let limits = limits.clone();
                    move |params| write_file(limits.clone(), params, false)
                },
            ),
            Tool::from_fn(
                "file_append",
                "Append content to the end of a file",
                ToolSchema::object()
                    .required_property("path", ParameterSchema::string("The path to the file to append to"))
                    .required_property("content", ParameterSchema::string("The content to append")),
                {
                    let limits = limits.clone();
                    move |params| write_file(limits.clone(), params, true)
                },
            ),
            Tool::from_fn(
                "file_list",
                "List files and directories in a given path",
                ToolSchema::object()
                    .property(
                        "path",
                        ParameterSchema::string("The directory path to list").with_default(json!(".")),
                    )
                    .property(
                        "hidden",
                        ParameterSchema::boolean("Include hidden files").with_default(json!(false)),
                    ),
                list_dir,
            ),
            Tool::from_fn(
                "shell_execute",
                "Execute a shell command. Dangerous commands are blocked for security.",
                ToolSchema::object()
                    .required_property("command", ParameterSchema::string("The shell command to execute"))
                    .property(
                        "timeout",
                        ParameterSchema::number("Timeout in milliseconds")
                            .with_default(json!(limits.shell_timeout_ms)),
                    ),
                {
                    let limits = limits.clone();
                    move |params| run_command(limits.clone(), params)
                },
            ),
        ]
    }

    /// Register every built-in tool as host-owned
    pub fn register(&self, registry: &ToolRegistry) -> Result<usize, RegistryError> {
        let tools = self.tools();
        let count = tools.len();
        for tool in tools {
            registry.register(tool)?;
        }
        info!("Initialized {} built-in tools", count);
        Ok(count)
    }
}

/// Reject paths that climb out with `..`
fn validate_path(path: &str) -> Result<&Path, ToolError> {
    let path = Path::new(path);
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ToolError::InvalidParams("Path traversal detected".to_string()));
    }
    Ok(path)
}

/// Read a file
async fn read_file(limits: Arc<Limits>, params: Value) -> Result<ToolResult, ToolError> {
    let params = Params::new(&params);
    let raw = params.require_str("path")?;
    let path = validate_path(raw)?;

    let size = tokio::fs::metadata(path).await?.len();
    if size > limits.max_read_size {
        return Ok(ToolResult::failure(format!(
            "File size ({} bytes) exceeds maximum ({} bytes)",
            size, limits.max_read_size
        )));
    }

    let bytes = tokio::fs::read(path).await?;
    let content = String::from_utf8_lossy(&bytes);

    Ok(ToolResult::success_with_message(
        json!({ "content": content, "size": size }),
        format!("Successfully read {} bytes from {}", size, raw),
    ))
}

/// Write or append to a file
async fn write_file(limits: Arc<Limits>, params: Value, append: bool) -> Result<ToolResult, ToolError> {
    let params = Params::new(&params);
    let raw = params.require_str("path")?;
    let content = params.require_str("content")?;
    let path = validate_path(raw)?;

    let size = content.len() as u64;
    if size > limits.max_write_size {
        return Ok(ToolResult::failure(format!(
            "Content size ({} bytes) exceeds maximum ({} bytes)",
            size, limits.max_write_size
        )));
    }

    if append {
        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        Ok(ToolResult::message_only(format!(
            "Successfully appended {} bytes to {}",
            size, raw
        )))
    } else {
        tokio::fs::write(path, content).await?;

        Ok(ToolResult::success_with_message(
            json!({ "path": raw, "size": size }),
            format!("Successfully wrote {} bytes to {}", size, raw),
        ))
    }
}

/// List directory contents
async fn list_dir(params: Value) -> Result<ToolResult, ToolError> {
    let params = Params::new(&params);
    let raw = params.get_str("path").unwrap_or(".");
    let path = validate_path(raw)?;
    let show_hidden = params.get_bool("hidden", false);

    let mut entries = tokio::fs::read_dir(path).await?;
    let mut items: Vec<Value> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();

        // Skip hidden files if not requested
        if !show_hidden && name.starts_with('.') {
            continue;
        }

        let metadata = entry.metadata().await.ok();
        let is_dir = metadata.as_ref().map(|m| m.is_dir()).unwrap_or(false);
        let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);

        items.push(json!({
            "name": name,
            "type": if is_dir { "directory" } else { "file" },
            "size": size,
        }));
    }

    items.sort_by(|a, b| {
        let a_name = a["name"].as_str().unwrap_or("");
        let b_name = b["name"].as_str().unwrap_or("");
        a_name.cmp(b_name)
    });

    let count = items.len();
    Ok(ToolResult::success_with_message(
        json!({ "path": raw, "items": items }),
        format!("Found {} items in {}", count, raw),
    ))
}

/// Run a shell command
async fn run_command(limits: Arc<Limits>, params: Value) -> Result<ToolResult, ToolError> {
    let params = Params::new(&params);
    let command = params.require_str("command")?;
    let timeout_ms = params.get_u64("timeout").unwrap_or(limits.shell_timeout_ms);

    if BLOCKED_COMMANDS
        .iter()
        .chain(limits.blocked.iter())
        .any(|re| re.is_match(command))
    {
        return Err(ToolError::Blocked(
            "Command blocked for security reasons".to_string(),
        ));
    }

    let (shell, shell_arg) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };

    debug!("Running shell command: {}", command);
    let child = Command::new(shell)
        .arg(shell_arg)
        .arg(command)
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(Duration::from_millis(timeout_ms), child)
        .await
        .map_err(|_| ToolError::Timeout { timeout_ms })??;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    let data = json!({
        "stdout": stdout,
        "stderr": stderr,
        "exit_code": exit_code,
    });

    if output.status.success() {
        Ok(ToolResult::success_with_message(
            data,
            format!("Command executed: {}", command),
        ))
    } else {
        let mut result = ToolResult::failure(format!("Command exited with code {}", exit_code));
        result.data = Some(data);
        Ok(result)
    }
}
