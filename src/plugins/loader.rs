//! Plugin loader
//!
//! Discovers plugin bundles in a directory and turns them into plugins.

use super::process::ProcessPlugin;
use super::types::{DiscoveredPlugin, Plugin, PluginManifest};
use crate::config::PluginConfig;
use crate::error::PluginError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Manifest file name inside a bundle directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Builds a plugin from a discovered bundle
#[async_trait]
pub trait PluginLoader: Send + Sync {
    async fn load(&self, discovered: &DiscoveredPlugin) -> Result<Arc<dyn Plugin>, PluginError>;
}

/// Loads bundles whose `main` is an executable speaking the JSON line protocol
pub struct ProcessLoader {
    timeout: Duration,
}

impl ProcessLoader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &PluginConfig) -> Self {
        Self::new(Duration::from_secs(config.timeout))
    }
}

#[async_trait]
impl PluginLoader for ProcessLoader {
    async fn load(&self, discovered: &DiscoveredPlugin) -> Result<Arc<dyn Plugin>, PluginError> {
        let exec_path = discovered.path.join(&discovered.manifest.main);

        if !exec_path.is_file() {
            return Err(PluginError::InvalidBundle(format!(
                "No executable found in plugin directory: {:?}",
                exec_path
            )));
        }

        if !is_executable(&exec_path) {
            return Err(PluginError::NotExecutable(exec_path));
        }

        Ok(Arc::new(ProcessPlugin::new(
            discovered.manifest.clone(),
            discovered.path.clone(),
            exec_path,
            self.timeout,
        )))
    }
}

/// Read and validate a bundle's manifest
pub async fn read_manifest(bundle_dir: &Path) -> Result<PluginManifest, PluginError> {
    let manifest_path = bundle_dir.join(MANIFEST_FILE);

    let content = tokio::fs::read_to_string(&manifest_path)
        .await
        .map_err(|e| PluginError::Manifest {
            path: manifest_path.clone(),
            reason: e.to_string(),
        })?;

    let manifest: PluginManifest =
        serde_json::from_str(&content).map_err(|e| PluginError::Manifest {
            path: manifest_path.clone(),
            reason: e.to_string(),
        })?;

    if manifest.metadata.name.trim().is_empty() {
        return Err(PluginError::InvalidBundle(
            "Invalid plugin structure: empty name".to_string(),
        ));
    }
    if manifest.metadata.version.trim().is_empty() {
        return Err(PluginError::InvalidBundle(
            "Invalid plugin structure: empty version".to_string(),
        ));
    }

    Ok(manifest)
}

/// Outcome of inspecting one directory entry
pub type ScanEntry = Result<DiscoveredPlugin, (String, PluginError)>;

/// Scan a plugin directory
///
/// Fails only if the directory itself cannot be read. Each bundle that
/// cannot be parsed comes back as an `Err` keyed by its directory name.
pub async fn scan_directory(plugin_dir: &Path) -> std::io::Result<Vec<ScanEntry>> {
    let mut entries = tokio::fs::read_dir(plugin_dir).await?;
    let mut paths: Vec<PathBuf> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    // read_dir order is platform dependent
    paths.sort();

    let mut found = Vec::new();
    for path in paths {
        let name = bundle_key(&path);

        // Skip hidden entries and loose files
        if name.starts_with('.') || !path.is_dir() {
            debug!("Skipping '{}'", name);
            continue;
        }

        match read_manifest(&path).await {
            Ok(manifest) => found.push(Ok(DiscoveredPlugin {
                name: manifest.metadata.name.clone(),
                path,
                manifest,
            })),
            Err(e) => found.push(Err((name, e))),
        }
    }

    Ok(found)
}

/// Name used for a bundle before its manifest is known
pub fn bundle_key(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Check if a file is executable
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.exists()
}
