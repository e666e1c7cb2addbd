//! Command-line argument parsing for bubble-tools

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// bubble-tools - Tool registry and plugin host for the Bubble assistant
#[derive(Parser, Debug)]
#[command(name = "bubble-tools")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", env = "BUBBLE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Plugin directory (overrides configuration)
    #[arg(long, value_name = "DIR", global = true)]
    pub plugin_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// List every registered tool definition as JSON
    Tools,

    /// Print the tool list in system-prompt form
    Prompt,

    /// Show loaded plugins and recorded plugin errors
    Plugins,

    /// Execute a tool and print its result
    Run {
        /// Tool name
        #[arg(value_name = "TOOL")]
        tool: String,

        /// Tool parameters as a JSON object
        #[arg(short, long, value_name = "JSON", default_value = "{}")]
        params: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_tools() {
        let args = Args::parse_from(["bubble-tools", "tools"]);
        assert_eq!(args.command, Command::Tools);
        assert!(!args.debug);
        assert!(args.plugin_dir.is_none());
    }

    #[test]
    fn test_args_run_defaults() {
        let args = Args::parse_from(["bubble-tools", "run", "get_weather"]);
        assert_eq!(
            args.command,
            Command::Run {
                tool: "get_weather".to_string(),
                params: "{}".to_string(),
            }
        );
    }

    #[test]
    fn test_args_global_flags_after_subcommand() {
        let args = Args::parse_from([
            "bubble-tools",
            "run",
            "file_read",
            "--params",
            r#"{"path": "notes.txt"}"#,
            "--debug",
            "--plugin-dir",
            "/tmp/plugins",
        ]);
        assert!(args.debug);
        assert_eq!(args.plugin_dir, Some(PathBuf::from("/tmp/plugins")));
        assert!(matches!(args.command, Command::Run { ref tool, .. } if tool == "file_read"));
    }

    #[test]
    fn test_args_requires_subcommand() {
        assert!(Args::try_parse_from(["bubble-tools"]).is_err());
    }
}
