//! Integration tests for the `urssaf` CLI binary.
//!
//! Argument parsing, help output, shell completions, configuration and
//! error exit codes, without a live site.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `urssaf` binary with env isolation.
///
/// Clears all `URSSAF_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn urssaf_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("urssaf");
    cmd.env("HOME", "/tmp/urssaf-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/urssaf-cli-test-nonexistent")
        .env_remove("URSSAF_PROFILE")
        .env_remove("URSSAF_CONFIG")
        .env_remove("URSSAF_OUTPUT")
        .env_remove("URSSAF_TIMEOUT")
        .env_remove("URSSAF_USERNAME")
        .env_remove("URSSAF_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = urssaf_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    urssaf_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("URSSAF")
            .and(predicate::str::contains("declare"))
            .and(predicate::str::contains("mandates"))
            .and(predicate::str::contains("context")),
    );
}

#[test]
fn test_declare_help_lists_flags() {
    urssaf_cmd().args(["declare", "--help"]).assert().success().stdout(
        predicate::str::contains("--payments")
            .and(predicate::str::contains("--redo"))
            .and(predicate::str::contains("--dry-run")),
    );
}

#[test]
fn test_version_flag() {
    urssaf_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("urssaf"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    urssaf_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    urssaf_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Usage errors ────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = urssaf_cmd().arg("foobar").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_amount_conflicts_with_payments() {
    urssaf_cmd()
        .args(["declare", "--amount", "100", "--payments", "payments.txt"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_invalid_redo_policy() {
    urssaf_cmd()
        .args(["declare", "--redo", "sometimes"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ifchanged"));
}

#[test]
fn test_invalid_output_format() {
    urssaf_cmd()
        .args(["--output", "xml", "mandates"])
        .assert()
        .code(2);
}

#[test]
fn test_declare_without_yes_when_not_interactive() {
    urssaf_cmd()
        .args(["declare", "--amount", "100"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--yes"));
}

// ── Credentials ─────────────────────────────────────────────────────

#[test]
fn test_declare_without_credentials() {
    urssaf_cmd()
        .args(["declare", "--amount", "100", "--dry-run"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No credentials"));
}

#[test]
fn test_unknown_profile() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[profiles.home]\nusername = \"me\"\n");
    urssaf_cmd()
        .arg("--config")
        .arg(&config)
        .args(["--profile", "work", "mandates"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("home"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_uses_flag() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("custom.toml");
    urssaf_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_show_redacts_password() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "default_profile = \"work\"\n\n[profiles.work]\nusername = \"me@example.test\"\npassword = \"hunter2\"\nredo = \"ifchanged\"\n",
    );
    urssaf_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.work]")
                .and(predicate::str::contains("password = \"****\""))
                .and(predicate::str::contains("hunter2").not()),
        );
}

#[test]
fn test_config_set_then_show_json() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    urssaf_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "mandate", "R2"])
        .assert()
        .success();

    let output = urssaf_cmd()
        .arg("--config")
        .arg(&config)
        .args(["-o", "json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["profiles"]["default"]["mandate"], "R2");
}

#[test]
fn test_config_set_rejects_bad_value() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    urssaf_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "redo", "maybe"])
        .assert()
        .code(2);
    assert!(!config.exists());
}

// ── Site errors ─────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_extraction_failure_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/assets/config/config.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "window.__env = {{\"ARCHIMED_LOGIN_API_URL\": \"{}/api/login/\"}};",
            server.uri()
        )))
        .mount(&server)
        .await;
    // An application shell whose layout changed: no main script.
    Mock::given(method("GET"))
        .and(path("/services/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>maintenance</body></html>"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        &format!(
            "[profiles.default]\nusername = \"me@example.test\"\npassword = \"hunter2\"\nbase_url = \"{}/\"\n",
            server.uri()
        ),
    );

    urssaf_cmd()
        .arg("--config")
        .arg(&config)
        .arg("mandates")
        .assert()
        .code(9)
        .stderr(predicate::str::contains("site configuration"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_site_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "[profiles.default]\nusername = \"me\"\npassword = \"pw\"\nbase_url = \"http://127.0.0.1:9/\"\ntimeout = 2\n",
    );
    urssaf_cmd()
        .arg("--config")
        .arg(&config)
        .arg("context")
        .assert()
        .code(7);
}
