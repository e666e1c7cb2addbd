//! Tool registry
//!
//! Maps tool names to definitions, keeps registration order for display,
//! and executes tools so that every failure comes back as a `ToolResult`.

use super::types::{Tool, ToolDefinition, ToolResult};
use crate::audit::{AuditEvent, AuditLogger};
use crate::config::ToolsConfig;
use crate::error::{panic_message, RegistryError, ToolError};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What `register` does when the name is already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Replace silently
    Overwrite,
    /// Replace and log a warning
    #[default]
    Warn,
    /// Keep the existing tool and refuse the new one
    Reject,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "warn" => Ok(Self::Warn),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "collision policy must be one of overwrite, warn, reject (got '{}')",
                other
            )),
        }
    }
}

/// Who registered a tool
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolOwner {
    /// Built-in tools and anything the host registers directly
    Host,
    /// Tools contributed by a named plugin
    Plugin(String),
}

impl fmt::Display for ToolOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolOwner::Host => write!(f, "host"),
            ToolOwner::Plugin(name) => write!(f, "plugin '{}'", name),
        }
    }
}

struct Entry {
    tool: Tool,
    owner: ToolOwner,
}

#[derive(Default)]
struct Entries {
    order: Vec<String>,
    tools: HashMap<String, Entry>,
}

/// Central registry for all available tools
pub struct ToolRegistry {
    entries: RwLock<Entries>,
    policy: CollisionPolicy,
    timeout: Option<Duration>,
    audit: Option<AuditLogger>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create an empty registry with the default collision policy
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            policy: CollisionPolicy::default(),
            timeout: None,
            audit: None,
        }
    }

    /// Create a registry configured from the `[tools]` section
    pub fn from_config(config: &ToolsConfig) -> Self {
        let mut registry = Self::new().with_policy(config.collision_policy);
        registry.timeout = config.execute_timeout();
        registry
    }

    pub fn with_policy(mut self, policy: CollisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    // Lock poisoning only means a panic happened elsewhere while the lock was
    // held; the map itself is always left consistent.
    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a host-owned tool
    pub fn register(&self, tool: Tool) -> Result<(), RegistryError> {
        self.register_owned(vec![tool], ToolOwner::Host)
    }

    /// Register a batch of tools under one owner
    ///
    /// The batch is checked before anything is inserted: either every tool
    /// is registered or none is.
    pub fn register_owned(&self, tools: Vec<Tool>, owner: ToolOwner) -> Result<(), RegistryError> {
        let mut entries = self.write();
        let mut seen: HashSet<&str> = HashSet::new();

        for tool in &tools {
            if tool.name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            let repeated = !seen.insert(tool.name.as_str());
            if self.policy == CollisionPolicy::Reject {
                if let Some(existing) = entries.tools.get(&tool.name) {
                    return Err(RegistryError::Collision {
                        name: tool.name.clone(),
                        owner: existing.owner.to_string(),
                    });
                }
                if repeated {
                    return Err(RegistryError::Collision {
                        name: tool.name.clone(),
                        owner: owner.to_string(),
                    });
                }
            } else if repeated {
                warn!("{} offers tool '{}' more than once, the last one wins", owner, tool.name);
            }
        }

        for tool in tools {
            let name = tool.name.clone();
            let entry = Entry {
                tool,
                owner: owner.clone(),
            };
            match entries.tools.insert(name.clone(), entry) {
                Some(previous) => match self.policy {
                    CollisionPolicy::Warn => warn!(
                        "Tool '{}' from {} replaced the one from {}",
                        name, owner, previous.owner
                    ),
                    _ => debug!("Tool '{}' from {} replaced the one from {}", name, owner, previous.owner),
                },
                None => {
                    debug!("Registered tool '{}' from {}", name, owner);
                    entries.order.push(name);
                }
            }
        }

        Ok(())
    }

    /// Remove a tool regardless of owner
    pub fn unregister(&self, name: &str) -> Option<Tool> {
        let mut entries = self.write();
        let entry = entries.tools.remove(name)?;
        entries.order.retain(|n| n != name);
        Some(entry.tool)
    }

    /// Remove every tool still owned by `owner`, returning the removed names
    pub fn unregister_owned(&self, owner: &ToolOwner) -> Vec<String> {
        let mut entries = self.write();
        let removed: Vec<String> = entries
            .order
            .iter()
            .filter(|name| entries.tools.get(*name).is_some_and(|e| &e.owner == owner))
            .cloned()
            .collect();

        for name in &removed {
            entries.tools.remove(name);
        }
        entries.order.retain(|n| !removed.contains(n));
        removed
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<Tool> {
        self.read().tools.get(name).map(|e| e.tool.clone())
    }

    /// Owner of a registered tool
    pub fn owner_of(&self, name: &str) -> Option<ToolOwner> {
        self.read().tools.get(name).map(|e| e.owner.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<String> {
        self.read().order.clone()
    }

    /// All tools in registration order
    pub fn get_all(&self) -> Vec<Tool> {
        let entries = self.read();
        entries
            .order
            .iter()
            .filter_map(|name| entries.tools.get(name))
            .map(|e| e.tool.clone())
            .collect()
    }

    /// All tool definitions in registration order
    pub fn get_all_definitions(&self) -> Vec<ToolDefinition> {
        self.get_all().iter().map(Tool::definition).collect()
    }

    /// Tool list for a system prompt, one `- name: description` per line
    pub fn describe(&self) -> String {
        self.get_all()
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Execute a tool
    ///
    /// Never fails: unknown tools, handler errors, panics and timeouts all
    /// come back as a result with `success: false`.
    pub async fn execute(&self, name: &str, params: Value) -> ToolResult {
        let started = Instant::now();
        let audit_params = self.audit.as_ref().map(|_| params.clone());

        let (event, result) = match self.get(name) {
            Some(tool) => {
                let result = self.invoke(&tool, params).await;
                let event = if result.success {
                    AuditEvent::Execute
                } else {
                    AuditEvent::Failed
                };
                (event, result)
            }
            None => {
                debug!("Execute called for unknown tool '{}'", name);
                (
                    AuditEvent::UnknownTool,
                    ToolResult::failure(ToolError::NotFound(name.to_string()).to_string()),
                )
            }
        };

        if let (Some(audit), Some(params)) = (&self.audit, audit_params) {
            audit.record(event, name, &params, &result, started.elapsed());
        }

        result
    }

    async fn invoke(&self, tool: &Tool, params: Value) -> ToolResult {
        debug!("Executing tool '{}'", tool.name);

        let call = AssertUnwindSafe(tool.handler.call(params)).catch_unwind();
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let err = ToolError::Timeout {
                        timeout_ms: limit.as_millis() as u64,
                    };
                    warn!("Tool '{}' {}", tool.name, err);
                    return ToolResult::failure(err.to_string());
                }
            },
            None => call.await,
        };

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                debug!("Tool '{}' failed: {}", tool.name, e);
                ToolResult::failure(e.to_string())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!("Tool '{}' panicked: {}", tool.name, reason);
                ToolResult::failure(format!("Tool '{}' panicked: {}", tool.name, reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn echo_tool(name: &str) -> Tool {
        Tool::from_fn(name, format!("{} tool", name), json!({"type": "object"}), |params| async move {
            Ok(ToolResult::success(params))
        })
    }

    fn weather_tool() -> Tool {
        Tool::from_fn(
            "get_weather",
            "Get current weather for a location",
            json!({
                "type": "object",
                "properties": { "location": { "type": "string" } },
                "required": ["location"]
            }),
            |params| async move {
                let location = params["location"].as_str().unwrap_or_default().to_string();
                Ok(ToolResult::success_with_message(
                    json!({ "location": location, "temperature": 21 }),
                    format!("Current weather for {}", location),
                ))
            },
        )
    }

    #[test]
    fn test_register_and_get() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("test_tool")).unwrap();

        let tool = registry.get("test_tool").unwrap();
        assert_eq!(tool.name, "test_tool");
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.owner_of("test_tool"), Some(ToolOwner::Host));
    }

    #[test]
    fn test_register_empty_name() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.register(echo_tool("  ")), Err(RegistryError::EmptyName));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_replace_keeps_count_and_position() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("a")).unwrap();
        registry.register(echo_tool("b")).unwrap();

        let replacement = Tool::from_fn("a", "replacement", json!({}), |_| async move {
            Ok(ToolResult::message_only("new"))
        });
        registry.register(replacement).unwrap();

        let defs = registry.get_all_definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "a");
        assert_eq!(defs[0].description, "replacement");
        assert_eq!(defs[1].name, "b");
    }

    #[test]
    fn test_definitions_in_registration_order() {
        let registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(echo_tool(name)).unwrap();
        }

        assert_eq!(registry.names(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_reject_policy() {
        let registry = ToolRegistry::new().with_policy(CollisionPolicy::Reject);
        registry.register(echo_tool("file_read")).unwrap();

        let result = registry.register_owned(
            vec![echo_tool("fresh"), echo_tool("file_read")],
            ToolOwner::Plugin("files".to_string()),
        );

        assert!(matches!(result, Err(RegistryError::Collision { .. })));
        // Nothing from the refused batch was registered
        assert!(!registry.contains("fresh"));
        assert_eq!(registry.owner_of("file_read"), Some(ToolOwner::Host));
    }

    #[test]
    fn test_reject_policy_repeated_name_in_batch() {
        let registry = ToolRegistry::new().with_policy(CollisionPolicy::Reject);

        let result = registry.register_owned(
            vec![echo_tool("x"), echo_tool("y"), echo_tool("x")],
            ToolOwner::Plugin("twice".to_string()),
        );

        assert_eq!(
            result,
            Err(RegistryError::Collision {
                name: "x".to_string(),
                owner: "plugin 'twice'".to_string(),
            })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_warn_policy_repeated_name_in_batch() {
        let registry = ToolRegistry::new();
        registry
            .register_owned(vec![echo_tool("x"), echo_tool("x")], ToolOwner::Host)
            .unwrap();

        assert_eq!(registry.names(), vec!["x"]);
    }

    #[test]
    fn test_unregister_owned_skips_shadowed_tools() {
        let registry = ToolRegistry::new();
        let plugin = ToolOwner::Plugin("weather".to_string());
        registry
            .register_owned(vec![echo_tool("get_weather"), echo_tool("forecast")], plugin.clone())
            .unwrap();
        registry.register(echo_tool("forecast")).unwrap();
        registry.register(echo_tool("other")).unwrap();

        let removed = registry.unregister_owned(&plugin);

        assert_eq!(removed, vec!["get_weather"]);
        assert!(registry.contains("forecast"));
        assert!(registry.contains("other"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unregister() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("a")).unwrap();

        assert!(registry.unregister("a").is_some());
        assert!(registry.unregister("a").is_none());
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_describe() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("a")).unwrap();
        registry.register(weather_tool()).unwrap();

        assert_eq!(
            registry.describe(),
            "- a: a tool\n- get_weather: Get current weather for a location"
        );
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nonexistent_tool", json!({})).await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(!error.is_empty());
        assert!(error.contains("nonexistent_tool"));
    }

    #[tokio::test]
    async fn test_execute_weather() {
        let registry = ToolRegistry::new();
        registry.register(weather_tool()).unwrap();

        let result = registry
            .execute("get_weather", json!({ "location": "New York" }))
            .await;

        assert!(result.success);
        assert_eq!(result.data.unwrap()["location"], "New York");
        assert_eq!(result.message.as_deref(), Some("Current weather for New York"));
    }

    #[tokio::test]
    async fn test_execute_handler_error() {
        let registry = ToolRegistry::new();
        registry
            .register(Tool::from_fn("broken", "Always fails", json!({}), |_| async move {
                Err(ToolError::Failed("disk on fire".to_string()))
            }))
            .unwrap();

        let result = registry.execute("broken", json!({})).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("disk on fire"));
    }

    #[tokio::test]
    async fn test_execute_handler_panic() {
        let registry = ToolRegistry::new();
        registry
            .register(Tool::from_fn("panics", "Panics", json!({}), |_| async move {
                if true {
                    panic!("handler exploded");
                }
                Ok(ToolResult::message_only("unreachable"))
            }))
            .unwrap();

        let result = registry.execute("panics", json!({})).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("handler exploded"));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let registry = ToolRegistry::new().with_timeout(Duration::from_millis(20));
        registry
            .register(Tool::from_fn("slow", "Sleeps", json!({}), |_| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(ToolResult::message_only("late"))
            }))
            .unwrap();

        let result = registry.execute("slow", json!({})).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Timed out"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_execute_while_registering() {
        use std::sync::Arc;

        let registry = Arc::new(ToolRegistry::new());
        registry.register(echo_tool("stable")).unwrap();
        let churn = ToolOwner::Plugin("churn".to_string());

        let writer = {
            let registry = registry.clone();
            let churn = churn.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    let tool = echo_tool(&format!("churn_{}", i % 5));
                    registry.register_owned(vec![tool], churn.clone()).unwrap();
                    if i % 3 == 0 {
                        registry.unregister_owned(&churn);
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..8)
            .map(|n| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        let result = registry.execute("stable", json!({ "n": n })).await;
                        assert!(result.success);
                        assert_eq!(result.data.unwrap()["n"], n);

                        // May or may not be registered at this moment
                        let churned = registry.execute("churn_0", json!({})).await;
                        assert!(churned.success || churned.error.is_some());
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        registry.unregister_owned(&churn);
        assert_eq!(registry.names(), vec!["stable"]);
        assert_eq!(registry.get_all().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_is_audited() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("tools.log");
        let config = AuditConfig {
            enabled: true,
            log_path: log_path.clone(),
            redact_secrets: false,
            ..AuditConfig::default()
        };

        let registry = ToolRegistry::new().with_audit(AuditLogger::new(config));
        registry.register(weather_tool()).unwrap();
        registry.execute("get_weather", json!({ "location": "Oslo" })).await;
        registry.execute("missing", json!({})).await;

        let content = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("get_weather"));
        assert!(lines[0].contains("Oslo"));
        assert!(lines[1].contains("unknown_tool"));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Reject".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Reject));
        assert_eq!("warn".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Warn));
        assert!("ignore".parse::<CollisionPolicy>().is_err());
    }
}
