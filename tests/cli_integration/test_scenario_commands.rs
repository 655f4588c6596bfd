//! Integration tests for scenario CLI commands
//!
//! Tests:
//! - list
//! - render
//! - run --fake

use super::support::{run_cli_command, run_cli_command_with_env, run_cli_command_with_env_removed};

#[tokio::test]
async fn test_list_json() {
    let output = run_cli_command(&["list", "--output", "json"]).await;
    assert!(output.success, "stderr: {}", output.stderr);

    let entries: serde_json::Value = serde_json::from_str(&output.stdout).expect("json catalog");
    let names: Vec<&str> =
        entries.as_array().unwrap().iter().filter_map(|e| e["name"].as_str()).collect();
    assert!(names.contains(&"ecc-strict-mtls"));
}

#[tokio::test]
async fn test_render_binds_namespace() {
    let output = run_cli_command(&["render", "ecc-strict-mtls", "--namespace", "echo-7"]).await;
    assert!(output.success, "stderr: {}", output.stderr);

    assert!(output.stdout.contains("# peer-authentication"));
    assert!(output.stdout.contains("# destination-rule"));
    assert!(output.stdout.contains("server.echo-7.svc.cluster.local"));
    assert!(output.stdout.contains("ISTIO_MUTUAL"));
    assert!(!output.stdout.contains("{{"));
}

#[tokio::test]
async fn test_render_unknown_scenario_fails() {
    let output = run_cli_command(&["render", "no-such-scenario", "--namespace", "echo"]).await;
    assert!(!output.success);
    assert!(output.stderr.contains("Unknown scenario"));
}

#[tokio::test]
async fn test_fake_run_passes() {
    let output = run_cli_command(&["run", "ecc-strict-mtls", "--fake"]).await;
    assert!(output.success, "stdout: {}\nstderr: {}", output.stdout, output.stderr);
    assert!(output.stdout.contains("PASS"));
    assert!(output.stdout.contains("assert public key algorithm"));
}

#[tokio::test]
async fn test_fake_run_json_is_parseable_on_pass() {
    let output = run_cli_command(&["run", "ecc-strict-mtls", "--fake", "-o", "json"]).await;
    assert!(output.success, "stderr: {}", output.stderr);

    let report: serde_json::Value = serde_json::from_str(&output.stdout).expect("json report");
    assert_eq!(report["state"], "passed");
    assert_eq!(report["steps"].as_array().unwrap().len(), 8);
    assert!(output.stderr.contains("PASS"));
}

#[tokio::test]
async fn test_fake_run_yaml_is_parseable_on_pass() {
    let output = run_cli_command(&["run", "ecc-strict-mtls", "--fake", "-o", "yaml"]).await;
    assert!(output.success, "stderr: {}", output.stderr);

    let report: serde_yaml::Value = serde_yaml::from_str(&output.stdout).expect("yaml report");
    assert_eq!(report["scenario"].as_str(), Some("ecc-strict-mtls"));
}

#[tokio::test]
async fn test_fake_run_with_ed25519_fails() {
    let output =
        run_cli_command(&["run", "ecc-strict-mtls", "--fake", "--fake-key", "ed25519", "-o", "json"])
            .await;
    assert!(!output.success);
    assert!(output.stderr.contains("FAIL"));

    let report: serde_json::Value = serde_json::from_str(&output.stdout).expect("json report");
    assert_eq!(report["state"], "failed");
    let last = report["steps"].as_array().unwrap().last().unwrap();
    assert_eq!(last["index"], 8);
    assert_eq!(last["outcome"], "failed");
}

#[tokio::test]
async fn test_run_without_kubeconfig_fails_for_kube() {
    let output = run_cli_command_with_env(
        &["run", "ecc-strict-mtls"],
        &[
            ("MESHVERIFY_CLUSTER__KIND", "kube"),
            ("MESHVERIFY_CLUSTER__KUBECONFIG", "/nonexistent/kubeconfig"),
            ("MESHVERIFY_CLUSTER__KUBECTL", "/nonexistent/kubectl"),
            ("MESHVERIFY_WAIT__TIMEOUT_SECS", "1"),
            ("MESHVERIFY_CAPTURE__ATTEMPTS", "1"),
        ],
    )
    .await;
    assert!(!output.success);
}

#[tokio::test]
async fn test_offline_commands_need_no_kubeconfig() {
    let kube = [("MESHVERIFY_CLUSTER__KIND", "kube")];
    let unset = ["HOME", "KUBECONFIG"];

    let output = run_cli_command_with_env_removed(&["list"], &kube, &unset).await;
    assert!(output.success, "stderr: {}", output.stderr);

    let output = run_cli_command_with_env_removed(
        &["render", "ecc-strict-mtls", "--namespace", "echo"],
        &kube,
        &unset,
    )
    .await;
    assert!(output.success, "stderr: {}", output.stderr);

    let output = run_cli_command_with_env_removed(&["run", "ecc-strict-mtls"], &kube, &unset).await;
    assert!(!output.success);
    assert!(output.stderr.contains("No kubeconfig"));
}
