//! Out-of-process plugins
//!
//! Each call spawns the bundle's executable, writes one request line and
//! waits for the response line carrying the same ID.

use super::protocol::{PluginRequest, PluginResponse, RequestKind};
use super::types::{Plugin, PluginManifest, PluginMetadata};
use crate::error::{PluginError, ToolError};
use crate::tools::{Tool, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Spawns a plugin executable and exchanges one request with it
#[derive(Debug)]
struct ProcessRunner {
    plugin: String,
    exec_path: PathBuf,
    bundle_dir: PathBuf,
    timeout: Duration,
}

impl ProcessRunner {
    async fn send(&self, request: &PluginRequest) -> Result<PluginResponse, PluginError> {
        debug!(
            "Sending {:?} request to plugin '{}' ({:?})",
            request.kind, self.plugin, self.exec_path
        );

        let mut child = Command::new(&self.exec_path)
            .current_dir(&self.bundle_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PluginError::Process(format!("Failed to spawn plugin: {}", e)))?;

        let request_json = serde_json::to_string(request)
            .map_err(|e| PluginError::Process(format!("Failed to serialize request: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(request_json.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            // Dropping stdin closes the pipe so line-reading plugins see EOF
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PluginError::Process("Failed to capture plugin stdout".to_string()))?;

        let response = tokio::time::timeout(self.timeout, read_response(stdout, &request.id))
            .await
            .map_err(|_| PluginError::Timeout(self.timeout.as_secs()))??;

        // Clean up
        let _ = child.start_kill();
        let _ = child.wait().await;

        Ok(response)
    }

    async fn invoke(&self, tool: &str, params: Value) -> Result<ToolResult, ToolError> {
        let request = PluginRequest::invoke(tool, params);
        self.send(&request)
            .await
            .map(|response| response.result)
            .map_err(|e| ToolError::Failed(e.to_string()))
    }

    async fn hook(&self, kind: RequestKind) -> Result<(), PluginError> {
        let response = self.send(&PluginRequest::hook(kind)).await?;
        if response.result.success {
            Ok(())
        } else {
            Err(PluginError::Hook {
                plugin: self.plugin.clone(),
                reason: response
                    .result
                    .error
                    .unwrap_or_else(|| format!("{:?} hook reported failure", kind)),
            })
        }
    }
}

/// Read lines until a response with the matching ID shows up
async fn read_response<R>(reader: R, request_id: &str) -> Result<PluginResponse, PluginError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        // Anything that is not our response is plugin chatter
        if let Ok(response) = serde_json::from_str::<PluginResponse>(&line) {
            if response.id == request_id {
                return Ok(response);
            }
        }
    }

    Err(PluginError::Process(
        "Plugin closed without responding".to_string(),
    ))
}

/// A plugin backed by an executable in its bundle directory
pub struct ProcessPlugin {
    metadata: PluginMetadata,
    tools: Vec<ToolDefinition>,
    lifecycle: bool,
    runner: Arc<ProcessRunner>,
}

impl ProcessPlugin {
    pub fn new(manifest: PluginManifest, bundle_dir: PathBuf, exec_path: PathBuf, timeout: Duration) -> Self {
        let runner = ProcessRunner {
            plugin: manifest.metadata.name.clone(),
            exec_path,
            bundle_dir,
            timeout,
        };

        Self {
            metadata: manifest.metadata,
            tools: manifest.tools,
            lifecycle: manifest.lifecycle,
            runner: Arc::new(runner),
        }
    }
}

#[async_trait]
impl Plugin for ProcessPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    async fn on_load(&self) -> Result<(), PluginError> {
        if self.lifecycle {
            self.runner.hook(RequestKind::Load).await?;
        }
        Ok(())
    }

    async fn on_unload(&self) -> Result<(), PluginError> {
        if self.lifecycle {
            self.runner.hook(RequestKind::Unload).await?;
        }
        Ok(())
    }

    fn tools(&self) -> Vec<Tool> {
        self.tools
            .iter()
            .map(|def| {
                let runner = self.runner.clone();
                let name = def.name.clone();
                Tool::from_fn(
                    def.name.clone(),
                    def.description.clone(),
                    def.parameters.clone(),
                    move |params| {
                        let runner = runner.clone();
                        let name = name.clone();
                        async move { runner.invoke(&name, params).await }
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_response_skips_chatter() {
        let output = concat!(
            "starting up\n",
            r#"{"id":"other","success":true}"#,
            "\n",
            r#"{"id":"req-1","success":true,"data":{"n":1},"message":"done"}"#,
            "\n"
        );

        let response = read_response(output.as_bytes(), "req-1").await.unwrap();

        assert_eq!(response.id, "req-1");
        assert_eq!(response.result.data, Some(json!({ "n": 1 })));
    }

    #[tokio::test]
    async fn test_read_response_eof() {
        let result = read_response("not json\n".as_bytes(), "req-1").await;

        assert!(matches!(result, Err(PluginError::Process(msg)) if msg.contains("without responding")));
    }

    #[tokio::test]
    async fn test_missing_executable_fails_call() {
        let manifest: PluginManifest = serde_json::from_value(json!({
            "name": "ghost",
            "version": "0.1.0",
            "tools": [{ "name": "ghost_tool", "description": "Nothing there" }]
        }))
        .unwrap();
        let plugin = ProcessPlugin::new(
            manifest,
            PathBuf::from("/"),
            PathBuf::from("/nonexistent/plugin/main"),
            Duration::from_secs(1),
        );

        // No lifecycle flag: hooks never touch the executable
        assert!(plugin.on_load().await.is_ok());

        let tools = plugin.tools();
        assert_eq!(tools.len(), 1);
        let result = tools[0].handler.call(json!({})).await;
        assert!(matches!(result, Err(ToolError::Failed(msg)) if msg.contains("Failed to spawn")));
    }
}
