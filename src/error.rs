//! Error types for bubble-tools

use std::any::Any;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for bubble-tools
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by tool handlers
///
/// The registry turns every one of these into a failed `ToolResult`,
/// so they never reach the caller of `execute` as an `Err`.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Blocked(String),

    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("{0}")]
    Failed(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Registry mutation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool name must not be empty")]
    EmptyName,

    #[error("Tool '{name}' is already registered by {owner}")]
    Collision { name: String, owner: String },
}

/// Plugin discovery, loading and lifecycle errors
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Failed to read manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("Invalid plugin bundle: {0}")]
    InvalidBundle(String),

    #[error("Plugin '{0}' is already loaded")]
    Duplicate(String),

    #[error("Plugin '{plugin}' hook failed: {reason}")]
    Hook { plugin: String, reason: String },

    #[error("Plugin is not executable: {0}")]
    NotExecutable(PathBuf),

    #[error("Plugin process error: {0}")]
    Process(String),

    #[error("Plugin timed out after {0}s")]
    Timeout(u64),

    #[error("Tool registration refused: {0}")]
    Registration(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Text carried by a caught panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
