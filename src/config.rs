//! Configuration management for bubble-tools
//!
//! Handles loading and merging configuration from multiple sources:
//! 1. Compiled defaults
//! 2. System config (/etc/bubble/config.toml)
//! 3. User config (~/.bubble/config.toml)
//! 4. CLI-specified config file
//! 5. Environment variables

use crate::error::ConfigError;
use crate::tools::CollisionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub plugins: PluginConfig,
    pub audit: AuditConfig,
}

/// Tool registry and built-in tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Register the built-in file and shell tools
    pub builtin: bool,
    /// What happens when a tool name is registered twice
    pub collision_policy: CollisionPolicy,
    /// Per-call execution timeout in seconds (0 disables)
    pub execute_timeout_secs: u64,
    /// Default timeout for shell_execute in milliseconds
    pub shell_timeout_ms: u64,
    /// Largest file file_read will return
    pub max_read_size: u64,
    /// Largest payload file_write / file_append will accept
    pub max_write_size: u64,
    /// Extra command patterns shell_execute refuses
    pub blocked_commands: Vec<String>,
}

/// Plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Enable plugins
    pub enabled: bool,
    /// Primary plugin directory, created on startup
    pub directory: PathBuf,
    /// Additional directories scanned during discovery
    pub extra_directories: Vec<PathBuf>,
    /// Load discovered plugins automatically
    pub auto_load: bool,
    /// Specific plugins to load (empty loads everything discovered)
    pub load: Vec<String>,
    /// Plugins that are discovered but never loaded
    pub disabled: Vec<String>,
    /// In-process plugins shipped with the binary
    pub bundled: Vec<String>,
    /// Plugin process timeout in seconds
    pub timeout: u64,
}

/// Tool execution audit log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Append every tool execution to the audit log
    pub enabled: bool,
    /// Log file path
    pub log_path: PathBuf,
    /// Redact secrets from logged parameters and errors
    pub redact_secrets: bool,
    /// Maximum log file size before rotation
    pub max_log_size: u64,
    /// Number of rotated logs to keep
    pub log_retention: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            collision_policy: CollisionPolicy::default(),
            execute_timeout_secs: 0,
            shell_timeout_ms: 30_000,
            max_read_size: 10 * 1024,   // 10KB
            max_write_size: 100 * 1024, // 100KB
            blocked_commands: vec![],
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            enabled: true,
            directory: home.join(".bubble/plugins"),
            extra_directories: vec![],
            auto_load: true,
            load: vec![],
            disabled: vec![],
            bundled: vec!["weather".to_string(), "github".to_string()],
            timeout: 30,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            enabled: true,
            log_path: home.join(".bubble/logs/tools.log"),
            redact_secrets: true,
            max_log_size: 10 * 1024 * 1024, // 10MB
            log_retention: 5,
        }
    }
}

impl ToolsConfig {
    /// Registry-level execution timeout, if any
    pub fn execute_timeout(&self) -> Option<Duration> {
        (self.execute_timeout_secs > 0).then(|| Duration::from_secs(self.execute_timeout_secs))
    }
}

impl PluginConfig {
    /// All directories scanned during discovery, primary first
    pub fn search_directories(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.directory.clone()];
        for dir in &self.extra_directories {
            if !dirs.contains(dir) {
                dirs.push(dir.clone());
            }
        }
        dirs
    }

    /// Whether a discovered plugin should be loaded
    pub fn should_load(&self, name: &str) -> bool {
        if self.disabled.iter().any(|d| d == name) {
            return false;
        }
        self.load.is_empty() || self.load.iter().any(|l| l == name)
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(cli_config: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Load system config
        let system_config = Path::new("/etc/bubble/config.toml");
        if system_config.exists() {
            debug!("Loading system config from {:?}", system_config);
            config.merge_from_file(system_config)?;
        }

        // Load user config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".bubble/config.toml");
            if user_config.exists() {
                debug!("Loading user config from {:?}", user_config);
                config.merge_from_file(&user_config)?;
            }
        }

        // Load CLI-specified config
        if let Some(path) = cli_config {
            debug!("Loading CLI config from {:?}", path);
            config.merge_from_file(path)?;
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Merge configuration from a file
    fn merge_from_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;

        let file_config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;

        self.merge(file_config);
        Ok(())
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        let tool_defaults = ToolsConfig::default();
        let plugin_defaults = PluginConfig::default();
        let audit_defaults = AuditConfig::default();

        // Tools config - booleans and the policy always take explicit values
        self.tools.builtin = other.tools.builtin;
        self.tools.collision_policy = other.tools.collision_policy;
        if other.tools.execute_timeout_secs != tool_defaults.execute_timeout_secs {
            self.tools.execute_timeout_secs = other.tools.execute_timeout_secs;
        }
        if other.tools.shell_timeout_ms != tool_defaults.shell_timeout_ms {
            self.tools.shell_timeout_ms = other.tools.shell_timeout_ms;
        }
        if other.tools.max_read_size != tool_defaults.max_read_size {
            self.tools.max_read_size = other.tools.max_read_size;
        }
        if other.tools.max_write_size != tool_defaults.max_write_size {
            self.tools.max_write_size = other.tools.max_write_size;
        }
        if !other.tools.blocked_commands.is_empty() {
            self.tools.blocked_commands = other.tools.blocked_commands;
        }

        // Plugin config
        self.plugins.enabled = other.plugins.enabled;
        self.plugins.auto_load = other.plugins.auto_load;
        if other.plugins.directory != plugin_defaults.directory {
            self.plugins.directory = other.plugins.directory;
        }
        if !other.plugins.extra_directories.is_empty() {
            self.plugins.extra_directories = other.plugins.extra_directories;
        }
        if !other.plugins.load.is_empty() {
            self.plugins.load = other.plugins.load;
        }
        if !other.plugins.disabled.is_empty() {
            self.plugins.disabled = other.plugins.disabled;
        }
        if other.plugins.bundled != plugin_defaults.bundled {
            self.plugins.bundled = other.plugins.bundled;
        }
        if other.plugins.timeout != plugin_defaults.timeout {
            self.plugins.timeout = other.plugins.timeout;
        }

        // Audit config
        self.audit.enabled = other.audit.enabled;
        self.audit.redact_secrets = other.audit.redact_secrets;
        if other.audit.log_path != audit_defaults.log_path {
            self.audit.log_path = other.audit.log_path;
        }
        if other.audit.max_log_size != audit_defaults.max_log_size {
            self.audit.max_log_size = other.audit.max_log_size;
        }
        if other.audit.log_retention != audit_defaults.log_retention {
            self.audit.log_retention = other.audit.log_retention;
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(dir) = std::env::var("BUBBLE_PLUGIN_DIR") {
            self.plugins.directory = PathBuf::from(dir);
        }
        if let Ok(policy) = std::env::var("BUBBLE_COLLISION_POLICY") {
            self.tools.collision_policy = policy.parse().map_err(ConfigError::Invalid)?;
        }
        if let Ok(log) = std::env::var("BUBBLE_AUDIT_LOG") {
            self.audit.log_path = PathBuf::from(log);
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.plugins.timeout == 0 {
            return Err(ConfigError::Invalid(
                "plugins.timeout must be greater than zero".to_string(),
            ));
        }
        if self.plugins.bundled.iter().any(|b| b.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "plugins.bundled must not contain empty names".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.tools.builtin);
        assert_eq!(config.tools.collision_policy, CollisionPolicy::Warn);
        assert_eq!(config.plugins.bundled, vec!["weather", "github"]);
        assert!(config.tools.execute_timeout().is_none());
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_invalid() {
        let mut config = Config::default();
        config.plugins.timeout = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
            [tools]
            collision_policy = "reject"
            execute_timeout_secs = 5

            [plugins]
            directory = "/opt/bubble/plugins"
            disabled = ["github"]

            [audit]
            enabled = false
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tools.collision_policy, CollisionPolicy::Reject);
        assert_eq!(config.tools.execute_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.plugins.directory, PathBuf::from("/opt/bubble/plugins"));
        assert!(!config.audit.enabled);
        // Unset fields keep their defaults
        assert_eq!(config.plugins.timeout, 30);
    }

    #[test]
    fn test_merge_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[plugins]\nload = [\"weather\"]\ntimeout = 5\n\n[tools]\nbuiltin = false\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.merge_from_file(&path).unwrap();

        assert_eq!(config.plugins.load, vec!["weather"]);
        assert_eq!(config.plugins.timeout, 5);
        assert!(!config.tools.builtin);
        assert_eq!(config.plugins.bundled, vec!["weather", "github"]);
    }

    #[test]
    fn test_merge_from_missing_file() {
        let mut config = Config::default();
        let result = config.merge_from_file(Path::new("/nonexistent/bubble.toml"));
        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn test_should_load() {
        let mut config = PluginConfig::default();
        assert!(config.should_load("anything"));

        config.disabled = vec!["github".to_string()];
        assert!(!config.should_load("github"));

        config.load = vec!["weather".to_string()];
        assert!(config.should_load("weather"));
        assert!(!config.should_load("other"));
    }

    #[test]
    fn test_search_directories_dedup() {
        let mut config = PluginConfig::default();
        config.directory = PathBuf::from("/a");
        config.extra_directories = vec![PathBuf::from("/b"), PathBuf::from("/a")];

        assert_eq!(
            config.search_directories(),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }
}
