//! Plugin system for bubble-tools
//!
//! Plugins contribute tools to the shared registry. Bundled plugins are
//! compiled in; everything else is a bundle directory holding a
//! `manifest.json` and an executable that speaks JSON lines over
//! stdin/stdout.

pub mod bundled;
mod loader;
mod manager;
mod process;
mod protocol;
mod types;

pub use loader::{read_manifest, scan_directory, PluginLoader, ProcessLoader, ScanEntry, MANIFEST_FILE};
pub use manager::PluginManager;
pub use process::ProcessPlugin;
pub use protocol::{PluginRequest, PluginResponse, RequestKind};
pub use types::{
    DiscoveredPlugin, Plugin, PluginErrorRecord, PluginInfo, PluginManifest, PluginMetadata,
    UnloadOutcome,
};
