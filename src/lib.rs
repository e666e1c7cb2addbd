//! bubble-tools
//!
//! Tool registry and plugin manager for the Bubble desktop assistant.
//! Tools are named, schema-described async handlers; plugins contribute
//! tools and can be loaded and unloaded at runtime.

pub mod audit;
pub mod config;
pub mod error;
pub mod plugins;
pub mod tools;

pub use config::Config;
pub use error::{Error, Result};
pub use plugins::PluginManager;
pub use tools::{Tool, ToolRegistry, ToolResult};
