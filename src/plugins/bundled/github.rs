//! GitHub plugin
//!
//! Mock repository search, issue creation and pull request listing.

use crate::error::{PluginError, ToolError};
use crate::plugins::{Plugin, PluginMetadata};
use crate::tools::{ParameterSchema, Params, Tool, ToolResult, ToolSchema};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use serde_json::{json, Value};
use std::future::ready;
use tracing::debug;

const LANGUAGES: [&str; 4] = ["TypeScript", "JavaScript", "Python", "Go"];
const PR_STATES: [&str; 3] = ["open", "closed", "all"];

/// Mock results never exceed this many items
const MAX_RESULTS: u64 = 5;

pub struct GithubPlugin {
    metadata: PluginMetadata,
}

impl GithubPlugin {
    pub fn new() -> Self {
        Self {
            metadata: PluginMetadata::new(
                "github",
                "1.0.0",
                "Interact with GitHub repositories and issues",
                "LocalDev Team",
            ),
        }
    }
}

impl Default for GithubPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn search_repos(params: Value) -> Result<ToolResult, ToolError> {
    let params = Params::new(&params);
    let query = params.require_str("query")?;
    let limit = params.get_u64("limit").unwrap_or(10).min(MAX_RESULTS);
    let mut rng = rand::rng();

    let repos: Vec<Value> = (1..=limit)
        .map(|i| {
            let age_secs = rng.random_range(0..365 * 24 * 60 * 60);
            json!({
                "name": format!("repo-{}", i),
                "full_name": format!("user/repo-{}", i),
                "description": format!("A sample repository for {}", query),
                "stars": rng.random_range(0..1000),
                "forks": rng.random_range(0..100),
                "language": LANGUAGES[rng.random_range(0..LANGUAGES.len())],
                "url": format!("https://github.com/user/repo-{}", i),
                "created_at": (Utc::now() - Duration::seconds(age_secs)).to_rfc3339(),
            })
        })
        .collect();

    let count = repos.len();
    Ok(ToolResult::success_with_message(
        json!({
            "query": query,
            "total_count": count,
            "repositories": repos,
        }),
        format!("Found {} repositories for \"{}\"", count, query),
    ))
}

fn create_issue(params: Value) -> Result<ToolResult, ToolError> {
    let params = Params::new(&params);
    let repo = params.require_str("repo")?;
    let title = params.require_str("title")?;
    let body = params.get_str("body").unwrap_or_default();
    let labels: Vec<Value> = params
        .get_str_list("labels")
        .into_iter()
        .map(|label| json!({ "name": label, "color": "0075ca" }))
        .collect();

    let mut rng = rand::rng();
    let number = rng.random_range(1..=1000);

    let issue = json!({
        "number": number,
        "title": title,
        "body": body,
        "state": "open",
        "labels": labels,
        "url": format!("https://github.com/{}/issues/{}", repo, number),
        "created_at": Utc::now().to_rfc3339(),
        "user": {
            "login": "current-user",
            "avatar_url": "https://github.com/identicons/current-user.png",
        },
    });

    Ok(ToolResult::success_with_message(
        issue,
        format!("Created issue #{} in {}", number, repo),
    ))
}

fn list_prs(params: Value) -> Result<ToolResult, ToolError> {
    let params = Params::new(&params);
    let repo = params.require_str("repo")?;
    let state = params.get_str("state").unwrap_or("open");
    if !PR_STATES.contains(&state) {
        return Err(ToolError::InvalidParams(format!(
            "state must be one of open, closed, all (got '{}')",
            state
        )));
    }
    let limit = params.get_u64("limit").unwrap_or(10).min(MAX_RESULTS);
    let mut rng = rand::rng();

    let prs: Vec<Value> = (1..=limit)
        .map(|i| {
            let pr_state = if state == "all" {
                ["open", "closed"][rng.random_range(0..2)]
            } else {
                state
            };
            let age_secs = rng.random_range(0..30 * 24 * 60 * 60);
            json!({
                "number": i,
                "title": format!("Pull Request #{}", i),
                "body": format!("Description for PR #{}", i),
                "state": pr_state,
                "url": format!("https://github.com/{}/pull/{}", repo, i),
                "created_at": (Utc::now() - Duration::seconds(age_secs)).to_rfc3339(),
                "user": {
                    "login": format!("user-{}", i),
                    "avatar_url": format!("https://github.com/identicons/user-{}.png", i),
                },
                "head": { "ref": format!("feature-{}", i), "sha": format!("abc123{}", i) },
                "base": { "ref": "main", "sha": "def456" },
            })
        })
        .collect();

    let count = prs.len();
    Ok(ToolResult::success_with_message(
        json!({
            "repository": repo,
            "state": state,
            "pull_requests": prs,
        }),
        format!("Found {} {} pull requests in {}", count, state, repo),
    ))
}

#[async_trait]
impl Plugin for GithubPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    async fn on_load(&self) -> Result<(), PluginError> {
        debug!("GitHub plugin loaded");
        Ok(())
    }

    async fn on_unload(&self) -> Result<(), PluginError> {
        debug!("GitHub plugin unloaded");
        Ok(())
    }

    fn tools(&self) -> Vec<Tool> {
        let repo = || ParameterSchema::string("Repository in format \"owner/repo\"");

        vec![
            Tool::from_fn(
                "search_repos",
                "Search GitHub repositories",
                ToolSchema::object()
                    .required_property(
                        "query",
                        ParameterSchema::string(
                            "Search query (e.g., \"react hooks\", \"language:typescript\")",
                        ),
                    )
                    .property(
                        "limit",
                        ParameterSchema::number("Maximum number of results to return")
                            .with_default(json!(10)),
                    ),
                |params| ready(search_repos(params)),
            ),
            Tool::from_fn(
                "create_issue",
                "Create a GitHub issue",
                ToolSchema::object()
                    .required_property("repo", repo())
                    .required_property("title", ParameterSchema::string("Issue title"))
                    .property("body", ParameterSchema::string("Issue description"))
                    .property(
                        "labels",
                        ParameterSchema::array(
                            "Labels to assign to the issue",
                            ParameterSchema::string("Label name"),
                        ),
                    ),
                |params| ready(create_issue(params)),
            ),
            Tool::from_fn(
                "list_prs",
                "List pull requests for a repository",
                ToolSchema::object()
                    .required_property("repo", repo())
                    .property(
                        "state",
                        ParameterSchema::string("State of pull requests to list")
                            .one_of(&PR_STATES)
                            .with_default(json!("open")),
                    )
                    .property(
                        "limit",
                        ParameterSchema::number("Maximum number of PRs to return")
                            .with_default(json!(10)),
                    ),
                |params| ready(list_prs(params)),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_repos_caps_results() {
        let result = search_repos(json!({ "query": "react hooks", "limit": 50 })).unwrap();
        let data = result.data.unwrap();

        assert_eq!(data["total_count"], 5);
        assert_eq!(data["repositories"].as_array().unwrap().len(), 5);
        assert_eq!(
            result.message.as_deref(),
            Some("Found 5 repositories for \"react hooks\"")
        );
    }

    #[test]
    fn test_search_repos_small_limit() {
        let result = search_repos(json!({ "query": "rust", "limit": 2 })).unwrap();
        assert_eq!(result.data.unwrap()["repositories"][1]["name"], "repo-2");
    }

    #[test]
    fn test_create_issue() {
        let result = create_issue(json!({
            "repo": "owner/repo",
            "title": "Crash on start",
            "labels": ["bug", "ui"],
        }))
        .unwrap();
        let data = result.data.unwrap();

        assert_eq!(data["title"], "Crash on start");
        assert_eq!(data["body"], "");
        assert_eq!(data["state"], "open");
        assert_eq!(data["labels"][1]["name"], "ui");
        assert!(data["url"].as_str().unwrap().starts_with("https://github.com/owner/repo/issues/"));
        assert!(result.message.unwrap().ends_with("in owner/repo"));
    }

    #[test]
    fn test_create_issue_requires_title() {
        assert!(create_issue(json!({ "repo": "owner/repo" })).is_err());
    }

    #[test]
    fn test_list_prs_states() {
        let result = list_prs(json!({ "repo": "owner/repo", "state": "closed", "limit": 3 })).unwrap();
        let data = result.data.unwrap();
        let prs = data["pull_requests"].as_array().unwrap();

        assert_eq!(prs.len(), 3);
        assert!(prs.iter().all(|pr| pr["state"] == "closed"));
        assert_eq!(data["state"], "closed");

        assert!(list_prs(json!({ "repo": "owner/repo", "state": "merged" })).is_err());
    }
}
