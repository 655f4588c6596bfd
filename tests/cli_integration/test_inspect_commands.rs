//! Integration tests for `inspect`

use rcgen::{CertificateParams, KeyPair, PKCS_ECDSA_P256_SHA256, PKCS_ED25519};

use super::support::{run_cli_command, TempWorkspace};

fn pem(alg: &'static rcgen::SignatureAlgorithm) -> String {
    let params = CertificateParams::new(vec!["server.echo.svc.cluster.local".to_string()]).unwrap();
    let key = KeyPair::generate_for(alg).unwrap();
    params.self_signed(&key).unwrap().pem()
}

#[tokio::test]
async fn test_inspect_matching_algorithm() {
    let workspace = TempWorkspace::new();
    let transcript = format!("CONNECTED(00000003)\n---\n{}---\n", pem(&PKCS_ECDSA_P256_SHA256));
    let file = workspace.write("server.txt", transcript);

    let output = run_cli_command(&[
        "inspect",
        file.to_str().unwrap(),
        "--expect-algorithm",
        "ecdsa",
    ])
    .await;

    assert!(output.success, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("server.echo.svc.cluster.local"));
    assert!(output.stdout.contains("PASS"));
}

#[tokio::test]
async fn test_inspect_json_is_parseable_on_pass() {
    let workspace = TempWorkspace::new();
    let file = workspace.write("server.pem", pem(&PKCS_ECDSA_P256_SHA256));

    let output = run_cli_command(&[
        "inspect",
        file.to_str().unwrap(),
        "--expect-algorithm",
        "ecdsa",
        "-o",
        "json",
    ])
    .await;

    assert!(output.success, "stderr: {}", output.stderr);
    let chain: serde_json::Value = serde_json::from_str(&output.stdout).expect("json output");
    assert_eq!(chain[0]["public_key_algorithm"], "Ecdsa");
    assert!(output.stderr.contains("public key algorithm is ECDSA"));
}

#[tokio::test]
async fn test_inspect_mismatched_algorithm_fails() {
    let workspace = TempWorkspace::new();
    let file = workspace.write("server.pem", pem(&PKCS_ED25519));

    let output = run_cli_command(&[
        "inspect",
        file.to_str().unwrap(),
        "--expect-algorithm",
        "ecdsa",
        "-o",
        "json",
    ])
    .await;

    assert!(!output.success);
    assert!(output.stderr.contains("expected ECDSA"));

    let chain: serde_json::Value = serde_json::from_str(&output.stdout).expect("json output");
    assert_eq!(chain.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_inspect_file_without_certificate_fails() {
    let workspace = TempWorkspace::new();
    let file = workspace.write("empty.txt", "no peer certificate available\n");

    let output = run_cli_command(&["inspect", file.to_str().unwrap()]).await;

    assert!(!output.success);
    assert!(output.stderr.contains("no CERTIFICATE block found"));
}
