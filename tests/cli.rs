//! End-to-end tests driving the bubble-tools binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Binary isolated from the user's home directory and environment
fn bubble(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("bubble-tools").unwrap();
    cmd.env("HOME", home.path())
        .env_remove("BUBBLE_CONFIG")
        .env_remove("BUBBLE_PLUGIN_DIR")
        .env_remove("BUBBLE_COLLISION_POLICY")
        .env_remove("BUBBLE_AUDIT_LOG")
        .env_remove("RUST_LOG")
        .current_dir(home.path());
    cmd
}

#[test]
fn run_bundled_weather_tool() {
    let home = TempDir::new().unwrap();

    bubble(&home)
        .args(["run", "get_weather", "--params", r#"{"location": "New York"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""success": true"#))
        .stdout(predicate::str::contains(r#""location": "New York""#))
        .stdout(predicate::str::contains("Current weather for New York"));

    // Default layout lives under ~/.bubble
    assert!(home.path().join(".bubble/plugins").is_dir());
    let audit = fs::read_to_string(home.path().join(".bubble/logs/tools.log")).unwrap();
    assert!(audit.contains(r#""tool":"get_weather""#));
}

#[test]
fn run_unknown_tool_fails() {
    let home = TempDir::new().unwrap();

    bubble(&home)
        .args(["run", "does_not_exist"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Tool 'does_not_exist' not found"));
}

#[test]
fn run_rejects_bad_params_json() {
    let home = TempDir::new().unwrap();

    bubble(&home)
        .args(["run", "get_weather", "--params", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--params is not valid JSON"));

    // Rejected before the plugin manager ran
    assert!(!home.path().join(".bubble/plugins").exists());
}

#[test]
fn prompt_lists_tools() {
    let home = TempDir::new().unwrap();

    bubble(&home)
        .arg("prompt")
        .assert()
        .success()
        .stdout(predicate::str::contains("- file_read: Read the contents of a file."))
        .stdout(predicate::str::contains(
            "- get_weather: Get current weather for a location",
        ))
        .stdout(predicate::str::contains("- search_repos: Search GitHub repositories"));
}

#[test]
fn file_tools_round_trip_in_working_directory() {
    let home = TempDir::new().unwrap();

    bubble(&home)
        .args([
            "run",
            "file_write",
            "--params",
            r#"{"path": "notes.txt", "content": "hello bubble"}"#,
        ])
        .assert()
        .success();

    bubble(&home)
        .args(["run", "file_read", "--params", r#"{"path": "notes.txt"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello bubble"));

    bubble(&home)
        .args(["run", "file_read", "--params", r#"{"path": "../escape.txt"}"#])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Path traversal detected"));
}

#[test]
fn plugins_reports_bundled_and_errors() {
    let home = TempDir::new().unwrap();
    let broken = home.path().join(".bubble/plugins/broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("manifest.json"), "{ nope").unwrap();

    bubble(&home)
        .arg("plugins")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "weather""#))
        .stdout(predicate::str::contains(r#""name": "github""#))
        .stdout(predicate::str::contains(r#""pluginName": "broken""#));
}

#[test]
fn config_file_disables_plugins() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bubble.toml");
    fs::write(&config, "[plugins]\nenabled = false\n").unwrap();

    bubble(&home)
        .args(["--config", config.to_str().unwrap(), "prompt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- shell_execute:"))
        .stdout(predicate::str::contains("get_weather").not());
}
