use meshverify::certificate::PublicKeyAlgorithm;
use meshverify::environment::{Environment, FakeCluster, KeyAlgorithm};
use meshverify::errors::{
    CaptureError, ConfigError, DecodeError, ProbeError, ScenarioError, StepError,
};
use meshverify::scenario::{CaptureCertificate, Scenario, ScenarioState, StepOutcome};
use meshverify::scenarios::ecc_strict_mtls;
use std::time::Duration;
use tokio::time::timeout;
use tracing_test::traced_test;

use super::support::*;

fn step_error(err: &ScenarioError) -> &StepError {
    err.step_error().expect("step failure")
}

#[traced_test]
#[tokio::test]
async fn test_ecdsa_mesh_passes() {
    let env = fake_env(mesh(KeyAlgorithm::Ecdsa));
    let mut scenario = ecc_strict_mtls::scenario(env.namespace());

    let report = timeout(SCENARIO_BUDGET, scenario.run(&env)).await.unwrap().unwrap();

    assert!(report.passed());
    assert_eq!(report.feature.as_deref(), Some("security.peer.ecc-signature-algorithm"));
    assert_eq!(report.steps.len(), 8);
    assert!(report.steps.iter().all(|s| s.outcome == StepOutcome::Passed));
    assert_eq!(scenario.state(), ScenarioState::Passed);
}

#[tokio::test]
async fn test_ed25519_mesh_fails_at_assertion() {
    let env = fake_env(mesh(KeyAlgorithm::Ed25519));
    let mut scenario = ecc_strict_mtls::scenario(env.namespace());

    let err = scenario.run(&env).await.unwrap_err();

    assert_eq!(err.failed_step(), Some("assert public key algorithm"));
    match step_error(&err) {
        StepError::Assertion(assertion) => {
            assert_eq!(assertion.expected, PublicKeyAlgorithm::Ecdsa.to_string());
            assert_eq!(assertion.actual, PublicKeyAlgorithm::Ed25519.to_string());
        }
        other => panic!("expected assertion failure, got {other:?}"),
    }
    assert_eq!(scenario.state(), ScenarioState::Failed);
}

#[tokio::test]
async fn test_empty_capture_fails_at_decode_and_skips_assertion() {
    let cluster =
        mesh(KeyAlgorithm::Ecdsa).with_artifact(NAMESPACE, "app=client", &capture_target(), Vec::new());
    let env = fake_env(cluster);
    let mut scenario = ecc_strict_mtls::scenario(env.namespace());

    let err = scenario.run(&env).await.unwrap_err();

    assert_eq!(err.failed_step(), Some("decode certificate"));
    assert!(matches!(
        step_error(&err),
        StepError::Decode(DecodeError::MalformedInput { .. })
    ));

    let report = scenario.report().unwrap();
    let assertion = report.steps.last().unwrap();
    assert_eq!(assertion.name, "assert public key algorithm");
    assert_eq!(assertion.outcome, StepOutcome::NotRun);
}

#[tokio::test]
async fn test_missing_proxy_fails_at_capture() {
    let cluster = FakeCluster::new()
        .with_workload(NAMESPACE, "client")
        .with_workload(NAMESPACE, "server")
        .with_service(NAMESPACE, "server", 200);
    let env = fake_env(cluster);
    let mut scenario = ecc_strict_mtls::scenario(env.namespace());

    let err = scenario.run(&env).await.unwrap_err();

    assert!(err.failed_step().unwrap().starts_with("capture certificate"));
    assert!(matches!(
        step_error(&err),
        StepError::Capture(CaptureError::ProxyNotFound { .. })
    ));
}

#[tokio::test]
async fn test_unknown_capture_target_exhausts_retries() {
    let env = fake_env(mesh(KeyAlgorithm::Ecdsa));
    let mut scenario = Scenario::new("capture-only")
        .step(CaptureCertificate::new("app=client", "server.echo:9999"));

    let err = scenario.run(&env).await.unwrap_err();
    match step_error(&err) {
        StepError::Capture(CaptureError::ArtifactAbsent { attempts, target, .. }) => {
            assert_eq!(*attempts, 3);
            assert_eq!(target, "server.echo:9999");
        }
        other => panic!("expected ArtifactAbsent, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_destination_rule_fails_at_apply() {
    let env = fake_env(mesh(KeyAlgorithm::Ecdsa).reject_kind("DestinationRule"));
    let mut scenario = ecc_strict_mtls::scenario(env.namespace());

    let err = scenario.run(&env).await.unwrap_err();

    assert_eq!(err.failed_step(), Some("apply destination-rule"));
    assert!(matches!(err, ScenarioError::StepFailed { index: 3, .. }));
    assert!(matches!(step_error(&err), StepError::Config(ConfigError::Rejected { .. })));
}

#[tokio::test]
async fn test_slow_propagation_times_out() {
    let cluster = mesh(KeyAlgorithm::Ecdsa).with_propagation_delay(Duration::from_secs(30));
    let env = fake_env_with_wait(cluster, 1);
    let mut scenario = ecc_strict_mtls::scenario(env.namespace());

    let err = timeout(SCENARIO_BUDGET, scenario.run(&env)).await.unwrap().unwrap_err();

    assert_eq!(err.failed_step(), Some("wait for peer-authentication"));
    match step_error(&err) {
        StepError::Timeout(waited) => {
            assert_eq!(waited.deadline, Duration::from_secs(1));
            assert!(waited.last_observation.is_some());
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_status_fails_at_call() {
    let cluster = mesh(KeyAlgorithm::Ecdsa).with_service(NAMESPACE, "server", 503);
    let env = fake_env(cluster);
    let mut scenario = ecc_strict_mtls::scenario(env.namespace());

    let err = scenario.run(&env).await.unwrap_err();

    assert_eq!(err.failed_step(), Some("call server from client"));
    assert!(matches!(
        step_error(&err),
        StepError::Probe(ProbeError::BadStatus { status: 503, call: 1, .. })
    ));
}

#[tokio::test]
async fn test_finished_scenario_cannot_rerun() {
    let env = fake_env(mesh(KeyAlgorithm::Ecdsa));
    let mut scenario = ecc_strict_mtls::scenario(env.namespace());
    scenario.run(&env).await.unwrap();

    let err = scenario.run(&env).await.unwrap_err();
    assert!(matches!(err, ScenarioError::NotPending { .. }));
}

#[tokio::test]
async fn test_independent_namespaces_run_concurrently() {
    let first = Environment::fake(
        FakeCluster::with_mesh_defaults("echo-a", KeyAlgorithm::Ecdsa).unwrap(),
        "echo-a",
    );
    let second = Environment::fake(
        FakeCluster::with_mesh_defaults("echo-b", KeyAlgorithm::Ed25519).unwrap(),
        "echo-b",
    );
    let mut a = ecc_strict_mtls::scenario("echo-a");
    let mut b = ecc_strict_mtls::scenario("echo-b");

    let (ra, rb) = tokio::join!(a.run(&first), b.run(&second));

    assert!(ra.unwrap().passed());
    assert_eq!(rb.unwrap_err().failed_step(), Some("assert public key algorithm"));
}
