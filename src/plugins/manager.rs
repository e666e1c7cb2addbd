//! Plugin manager
//!
//! Owns the plugin lifecycle: discovery, load, unload and the error log.
//! Tools contributed by plugins live in the shared `ToolRegistry` under a
//! `ToolOwner::Plugin` tag, so unloading only removes what a plugin still
//! owns.

use super::bundled;
use super::loader::{bundle_key, read_manifest, scan_directory, PluginLoader, ProcessLoader};
use super::types::{DiscoveredPlugin, Plugin, PluginErrorRecord, PluginInfo, UnloadOutcome};
use crate::config::PluginConfig;
use crate::error::{panic_message, PluginError};
use crate::tools::{ToolOwner, ToolRegistry};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A plugin that made it into the registry
struct LoadedPlugin {
    plugin: Arc<dyn Plugin>,
    path: Option<PathBuf>,
    tools: Vec<String>,
}

impl LoadedPlugin {
    fn name(&self) -> &str {
        &self.plugin.metadata().name
    }

    /// Descriptor listing only the tools this plugin still owns
    fn info(&self, registry: &ToolRegistry) -> PluginInfo {
        let owner = ToolOwner::Plugin(self.name().to_string());
        PluginInfo {
            metadata: self.plugin.metadata().clone(),
            path: self.path.clone(),
            tools: self
                .tools
                .iter()
                .filter(|tool| registry.owner_of(tool.as_str()).as_ref() == Some(&owner))
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Load,
    Unload,
}

/// Run a lifecycle hook, turning a panic into a hook error
async fn run_hook(plugin: &Arc<dyn Plugin>, stage: Stage) -> Result<(), PluginError> {
    let call = match stage {
        Stage::Load => plugin.on_load(),
        Stage::Unload => plugin.on_unload(),
    };

    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(PluginError::Hook {
            plugin: plugin.metadata().name.clone(),
            reason: format!("{:?} hook panicked: {}", stage, panic_message(panic.as_ref())),
        }),
    }
}

/// Plugin manager
pub struct PluginManager {
    config: PluginConfig,
    registry: Arc<ToolRegistry>,
    loader: Arc<dyn PluginLoader>,
    plugins: Vec<LoadedPlugin>,
    errors: Vec<PluginErrorRecord>,
    initialized: bool,
}

impl PluginManager {
    /// Create a manager that loads bundles as out-of-process plugins
    pub fn new(config: PluginConfig, registry: Arc<ToolRegistry>) -> Self {
        let loader = Arc::new(ProcessLoader::from_config(&config));
        Self {
            config,
            registry,
            loader,
            plugins: Vec::new(),
            errors: Vec::new(),
            initialized: false,
        }
    }

    /// Replace the bundle loader
    pub fn with_loader(mut self, loader: Arc<dyn PluginLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Prepare the plugin directory and load every enabled plugin
    ///
    /// Returns how many plugins this call loaded. Calling it again is a
    /// no-op that returns 0.
    pub async fn initialize(&mut self) -> usize {
        if self.initialized {
            debug!("Plugin manager already initialized");
            return 0;
        }
        self.initialized = true;

        if !self.config.enabled {
            info!("Plugins disabled by configuration");
            return 0;
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.config.directory).await {
            warn!("Failed to create plugin directory {:?}: {}", self.config.directory, e);
            let key = self.config.directory.display().to_string();
            self.record_error(&key, format!("Failed to create plugin directory: {}", e));
        }

        let mut loaded = 0;

        for name in self.config.bundled.clone() {
            if !self.config.should_load(&name) {
                debug!("Skipping bundled plugin '{}'", name);
                continue;
            }
            match bundled::create(&name) {
                Some(plugin) => {
                    if self.attach(plugin, None).await.is_ok() {
                        loaded += 1;
                    }
                }
                None => self.record_error(&name, "Unknown bundled plugin"),
            }
        }

        if self.config.auto_load {
            for discovered in self.discover_plugins().await {
                if !self.config.should_load(&discovered.name) {
                    debug!("Plugin '{}' not enabled, skipping", discovered.name);
                    continue;
                }
                if self.load_discovered(&discovered).await.is_ok() {
                    loaded += 1;
                }
            }
        }

        info!(
            "Loaded {} plugins ({} tools registered)",
            loaded,
            self.registry.len()
        );
        loaded
    }

    /// Scan every plugin directory for bundles
    ///
    /// Bundles that fail to parse are recorded in the error log and left
    /// out. When two bundles carry the same plugin name the first one wins
    /// and the other is recorded under its directory name.
    pub async fn discover_plugins(&mut self) -> Vec<DiscoveredPlugin> {
        let mut found: Vec<DiscoveredPlugin> = Vec::new();

        for dir in self.config.search_directories() {
            if !dir.exists() {
                debug!("Plugin directory {:?} does not exist", dir);
                continue;
            }

            let entries = match scan_directory(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Failed to read plugin directory {:?}: {}", dir, e);
                    let key = dir.display().to_string();
                    self.record_error(&key, format!("Failed to read plugin directory: {}", e));
                    continue;
                }
            };

            for entry in entries {
                match entry {
                    Ok(discovered) => {
                        if let Some(first) = found.iter().find(|d| d.name == discovered.name) {
                            warn!(
                                "Plugin '{}' at {:?} skipped, already provided by {:?}",
                                discovered.name, discovered.path, first.path
                            );
                            let err = PluginError::Duplicate(discovered.name.clone());
                            let reason = format!("{} (bundle at {:?})", err, first.path);
                            self.record_error(&bundle_key(&discovered.path), reason);
                            continue;
                        }
                        debug!("Discovered plugin '{}' at {:?}", discovered.name, discovered.path);
                        found.push(discovered);
                    }
                    Err((key, e)) => {
                        warn!("Failed to load plugin manifest '{}': {}", key, e);
                        self.record_error(&key, e.to_string());
                    }
                }
            }
        }

        found
    }

    /// Load the bundle at `path`
    pub async fn load_plugin(&mut self, path: &Path) -> Result<PluginInfo, PluginError> {
        let manifest = match read_manifest(path).await {
            Ok(manifest) => manifest,
            Err(e) => {
                self.record_error(&bundle_key(path), e.to_string());
                return Err(e);
            }
        };

        let discovered = DiscoveredPlugin {
            name: manifest.metadata.name.clone(),
            path: path.to_path_buf(),
            manifest,
        };
        self.load_discovered(&discovered).await
    }

    /// Load a bundle returned by `discover_plugins`
    pub async fn load_discovered(&mut self, discovered: &DiscoveredPlugin) -> Result<PluginInfo, PluginError> {
        // Manifest failures are keyed by directory, everything later by name
        self.clear_plugin_errors(&bundle_key(&discovered.path));
        self.clear_plugin_errors(&discovered.name);

        // Checked here as well so a duplicate never reaches the loader
        if self.is_plugin_loaded(&discovered.name) {
            let err = PluginError::Duplicate(discovered.name.clone());
            self.record_error(&discovered.name, err.to_string());
            return Err(err);
        }

        let plugin = match self.loader.load(discovered).await {
            Ok(plugin) => plugin,
            Err(e) => {
                warn!("Failed to load plugin '{}': {}", discovered.name, e);
                self.record_error(&discovered.name, e.to_string());
                return Err(e);
            }
        };

        self.attach(plugin, Some(discovered.path.clone())).await
    }

    /// Load an already constructed plugin
    ///
    /// Runs `on_load`, then registers every tool the plugin offers. If the
    /// registry refuses the tools, `on_unload` runs to undo the load.
    pub async fn attach(&mut self, plugin: Arc<dyn Plugin>, path: Option<PathBuf>) -> Result<PluginInfo, PluginError> {
        let name = match plugin.metadata().name.trim() {
            "" => path
                .as_deref()
                .map(bundle_key)
                .unwrap_or_else(|| "<unnamed>".to_string()),
            name => name.to_string(),
        };
        self.clear_plugin_errors(&name);

        match self.try_attach(plugin, path).await {
            Ok(info) => {
                info!(
                    "Loaded plugin '{}' v{} with {} tools",
                    info.metadata.name,
                    info.metadata.version,
                    info.tools.len()
                );
                Ok(info)
            }
            Err(e) => {
                warn!("Failed to load plugin '{}': {}", name, e);
                self.record_error(&name, e.to_string());
                Err(e)
            }
        }
    }

    async fn try_attach(&mut self, plugin: Arc<dyn Plugin>, path: Option<PathBuf>) -> Result<PluginInfo, PluginError> {
        let metadata = plugin.metadata();
        if metadata.name.trim().is_empty() {
            return Err(PluginError::InvalidBundle(
                "Invalid plugin structure: empty name".to_string(),
            ));
        }
        if metadata.version.trim().is_empty() {
            return Err(PluginError::InvalidBundle(
                "Invalid plugin structure: empty version".to_string(),
            ));
        }
        let name = metadata.name.clone();

        if self.is_plugin_loaded(&name) {
            return Err(PluginError::Duplicate(name));
        }

        run_hook(&plugin, Stage::Load).await?;

        let tools = plugin.tools();
        let mut tool_names: Vec<String> = Vec::with_capacity(tools.len());
        for tool in &tools {
            if !tool_names.contains(&tool.name) {
                tool_names.push(tool.name.clone());
            }
        }

        if let Err(e) = self
            .registry
            .register_owned(tools, ToolOwner::Plugin(name.clone()))
        {
            if let Err(unload_err) = run_hook(&plugin, Stage::Unload).await {
                warn!("Rollback of plugin '{}' failed: {}", name, unload_err);
            }
            return Err(e.into());
        }

        let loaded = LoadedPlugin {
            plugin,
            path,
            tools: tool_names,
        };
        let info = loaded.info(&self.registry);
        self.plugins.push(loaded);
        Ok(info)
    }

    /// Unload a plugin by name
    ///
    /// A failing `on_unload` is recorded, the plugin is removed anyway.
    pub async fn unload_plugin(&mut self, name: &str) -> UnloadOutcome {
        let Some(index) = self.plugins.iter().position(|p| p.name() == name) else {
            debug!("Unload requested for plugin '{}' which is not loaded", name);
            return UnloadOutcome::NotLoaded;
        };

        let plugin = self.plugins[index].plugin.clone();
        if let Err(e) = run_hook(&plugin, Stage::Unload).await {
            warn!("Error unloading plugin '{}': {}", name, e);
            self.record_error(name, e.to_string());
        }

        let tools_removed = self
            .registry
            .unregister_owned(&ToolOwner::Plugin(name.to_string()));
        self.plugins.remove(index);

        info!("Unloaded plugin '{}' ({} tools removed)", name, tools_removed.len());
        UnloadOutcome::Unloaded { tools_removed }
    }

    /// Loaded plugins in load order
    pub fn get_plugins(&self) -> Vec<PluginInfo> {
        self.plugins
            .iter()
            .map(|p| p.info(&self.registry))
            .collect()
    }

    pub fn get_plugin(&self, name: &str) -> Option<PluginInfo> {
        self.plugins
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.info(&self.registry))
    }

    pub fn is_plugin_loaded(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name() == name)
    }

    /// Errors recorded so far, oldest first
    pub fn get_errors(&self) -> Vec<PluginErrorRecord> {
        self.errors.clone()
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn clear_plugin_errors(&mut self, name: &str) {
        self.errors.retain(|e| e.plugin_name != name);
    }

    /// Unload every plugin, newest first
    pub async fn shutdown(&mut self) {
        while let Some(name) = self.plugins.last().map(|p| p.name().to_string()) {
            self.unload_plugin(&name).await;
        }
        self.initialized = false;
    }

    /// Keep one error per plugin: a new failure replaces the old record
    fn record_error(&mut self, plugin_name: &str, error: impl Into<String>) {
        self.clear_plugin_errors(plugin_name);
        self.errors.push(PluginErrorRecord::new(plugin_name, error));
    }
}
