//! Integration tests for settings CLI commands
//!
//! Tests:
//! - config init
//! - config show
//! - --config with an invalid file

use super::support::{run_cli_command, run_cli_command_with_env, TempWorkspace};

#[tokio::test]
async fn test_init_then_show_with_file() {
    let workspace = TempWorkspace::new();
    let path = workspace.path("meshverify.toml");
    let path_str = path.to_str().unwrap();

    let output = run_cli_command(&["config", "init", path_str]).await;
    assert!(output.success, "stderr: {}", output.stderr);
    assert!(path.exists());

    let output = run_cli_command(&["config", "init", path_str]).await;
    assert!(!output.success);
    assert!(output.stderr.contains("--force"));

    let output = run_cli_command_with_env(
        &["--config", path_str, "config", "show", "--output", "json"],
        &[("MESHVERIFY_NAMESPACE", "echo-env")],
    )
    .await;
    assert!(output.success, "stderr: {}", output.stderr);

    let settings: serde_json::Value = serde_json::from_str(&output.stdout).expect("json settings");
    assert_eq!(settings["namespace"], "echo-env");
    assert_eq!(settings["cluster"]["kind"], "fake");
    assert_eq!(settings["capture"]["container"], "istio-proxy");
}

#[tokio::test]
async fn test_invalid_settings_file_is_rejected() {
    let workspace = TempWorkspace::new();
    let path = workspace.write("bad.toml", "[capture]\nattempts = 0\n");

    let output = run_cli_command(&["--config", path.to_str().unwrap(), "list"]).await;
    assert!(!output.success);
    assert!(output.stderr.contains("Capture attempts"));
}
