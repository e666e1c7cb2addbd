//! bubble-tools - Tool registry and plugin host
//!
//! This is the main entry point for the bubble-tools binary.

use anyhow::{Context, Result};
use bubble_tools::audit::AuditLogger;
use bubble_tools::config::Config;
use bubble_tools::plugins::PluginManager;
use bubble_tools::tools::{BuiltinTools, ToolRegistry};
use clap::Parser;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.debug);

    info!("Starting bubble-tools v{}", env!("CARGO_PKG_VERSION"));

    // Reject bad input before any plugin is loaded
    let run_params: Option<Value> = match &args.command {
        Command::Run { params, .. } => {
            Some(serde_json::from_str(params).context("--params is not valid JSON")?)
        }
        _ => None,
    };

    // Load configuration
    let mut config = match Config::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Config::default()
        }
    };

    if let Some(dir) = args.plugin_dir {
        config.plugins.directory = dir;
    }

    // Build the registry
    let mut registry = ToolRegistry::from_config(&config.tools);
    if config.audit.enabled {
        registry = registry.with_audit(AuditLogger::new(config.audit.clone()));
    }
    let registry = Arc::new(registry);

    if config.tools.builtin {
        BuiltinTools::new(&config.tools)
            .register(&registry)
            .context("Failed to register built-in tools")?;
    }

    // Load plugins
    let mut manager = PluginManager::new(config.plugins.clone(), registry.clone());
    manager.initialize().await;

    let success = match args.command {
        Command::Tools => {
            print_json(&serde_json::to_value(registry.get_all_definitions())?)?;
            true
        }
        Command::Prompt => {
            println!("{}", registry.describe());
            true
        }
        Command::Plugins => {
            print_json(&json!({
                "plugins": manager.get_plugins(),
                "errors": manager.get_errors(),
            }))?;
            true
        }
        Command::Run { tool, .. } => {
            let params = run_params.unwrap_or_else(|| json!({}));
            let result = registry.execute(&tool, params).await;
            print_json(&serde_json::to_value(&result)?)?;
            result.success
        }
    };

    manager.shutdown().await;

    if !success {
        std::process::exit(1);
    }

    info!("bubble-tools exited");
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize the logging/tracing subsystem
fn init_logging(debug: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
