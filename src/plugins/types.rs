//! Plugin types
//!
//! The capability interface every plugin satisfies, the on-disk manifest
//! and the descriptors the manager hands out.

use crate::error::PluginError;
use crate::tools::{Tool, ToolDefinition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Descriptive plugin fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
}

impl PluginMetadata {
    pub fn new(name: &str, version: &str, description: &str, author: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            description: description.to_string(),
            author: author.to_string(),
        }
    }
}

/// A bundle of tools with load/unload hooks
#[async_trait]
pub trait Plugin: Send + Sync {
    fn metadata(&self) -> &PluginMetadata;

    /// Called before the plugin's tools are registered
    async fn on_load(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called before the plugin's tools are removed
    async fn on_unload(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Tools contributed by this plugin, in order
    fn tools(&self) -> Vec<Tool>;
}

fn default_main() -> String {
    "main".to_string()
}

/// Plugin manifest format (`manifest.json` inside a bundle directory)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(flatten)]
    pub metadata: PluginMetadata,
    /// Executable relative to the bundle directory
    #[serde(default = "default_main")]
    pub main: String,
    /// Forward load/unload hooks to the executable
    #[serde(default)]
    pub lifecycle: bool,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

/// A bundle found on disk but not necessarily loaded
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    pub name: String,
    pub path: PathBuf,
    pub manifest: PluginManifest,
}

/// A loaded plugin as seen from outside: no handlers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginInfo {
    #[serde(flatten)]
    pub metadata: PluginMetadata,
    /// Bundle directory, `None` for in-process plugins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Names of the tools this plugin registered
    pub tools: Vec<String>,
}

/// One recorded plugin failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginErrorRecord {
    pub plugin_name: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl PluginErrorRecord {
    pub fn new(plugin_name: &str, error: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Result of `PluginManager::unload_plugin`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnloadOutcome {
    Unloaded { tools_removed: Vec<String> },
    NotLoaded,
}
