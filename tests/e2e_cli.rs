//! CLI end-to-end tests
//!
//! Tests for the seekgate command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the seekgate binary, isolated from the caller's
/// environment and any config file in the working directory.
#[allow(deprecated)]
fn seekgate_cmd(cwd: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("seekgate").unwrap();
    cmd.current_dir(cwd)
        .env("HOME", cwd)
        .env_remove("SIGNING_SECRET")
        .env_remove("PORT")
        .env_remove("AUTH_REQUIRED")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_no_args_shows_help() {
    let temp = tempdir().unwrap();
    seekgate_cmd(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let temp = tempdir().unwrap();
    seekgate_cmd(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("seekgate"))
        .stdout(predicate::str::contains("sign-token"));
}

#[test]
fn test_cli_version_command() {
    let temp = tempdir().unwrap();
    seekgate_cmd(temp.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("seekgate "));
}

#[test]
fn test_cli_start_help() {
    let temp = tempdir().unwrap();
    seekgate_cmd(temp.path())
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the video server"));
}

#[test]
fn test_cli_start_invalid_port() {
    let temp = tempdir().unwrap();
    seekgate_cmd(temp.path())
        .args(["start", "--port", "99999"])
        .assert()
        .failure();
}

#[test]
fn test_cli_generate_secret() {
    let temp = tempdir().unwrap();
    seekgate_cmd(temp.path())
        .arg("generate-secret")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^[0-9a-f]{64}\n$").unwrap());
}

#[test]
fn test_cli_generate_api_key() {
    let temp = tempdir().unwrap();
    seekgate_cmd(temp.path())
        .arg("generate-api-key")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^[A-Za-z0-9_-]{43}\n$").unwrap());
}

#[test]
fn test_cli_validate_config_file() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("seekgate.toml");
    fs::write(
        &config_file,
        r#"
[server]
host = "127.0.0.1"
port = 9090
video_root = "/srv/videos"

[throttle]
max_delay_ms = 4000

[auth]
required = true
api_keys = ["k1", "k2"]
"#,
    )
    .unwrap();

    seekgate_cmd(temp.path())
        .args(["validate", config_file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("127.0.0.1:9090"))
        .stdout(predicate::str::contains("capped at 4000 ms"))
        .stdout(predicate::str::contains("API keys: 2"));
}

#[test]
fn test_cli_validate_rejects_zero_port() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("seekgate.toml");
    fs::write(&config_file, "[server]\nport = 0\n").unwrap();

    seekgate_cmd(temp.path())
        .args(["validate", config_file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("port"));
}

#[test]
fn test_cli_validate_rejects_malformed_toml() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("seekgate.toml");
    fs::write(&config_file, "[throttle]\nmax_delay_ms = \"soon\"\n").unwrap();

    seekgate_cmd(temp.path())
        .args(["validate", config_file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_cli_sign_token_with_env_secret() {
    let temp = tempdir().unwrap();
    seekgate_cmd(temp.path())
        .env("SIGNING_SECRET", "cli-secret")
        .args(["sign-token", "clip.mp4", "--ttl-secs", "120"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^\d+\.[0-9a-f]{64}\n$").unwrap());
}

#[test]
fn test_cli_sign_token_without_secret_fails() {
    let temp = tempdir().unwrap();
    seekgate_cmd(temp.path())
        .args(["sign-token", "clip.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No signing secret configured"));
}
