//! Shared fixtures for harness tests.

use std::time::Duration;

use meshverify::config::{ClusterKind, HarnessConfig};
use meshverify::environment::{Cluster, Environment, FakeCluster, KeyAlgorithm};
use rcgen::{CertificateParams, KeyPair, PKCS_ECDSA_P256_SHA256};

pub const NAMESPACE: &str = "echo";

/// Where the client proxy dials the server in the ECDSA scenario
pub fn capture_target() -> String {
    format!("server.{}:8091", NAMESPACE)
}

/// Mesh layout serving a workload certificate of `key`
pub fn mesh(key: KeyAlgorithm) -> FakeCluster {
    FakeCluster::with_mesh_defaults(NAMESPACE, key).expect("issue workload certificate")
}

pub fn fake_env(cluster: FakeCluster) -> Environment {
    Environment::fake(cluster, NAMESPACE)
}

/// Fake environment with a custom config propagation deadline
pub fn fake_env_with_wait(cluster: FakeCluster, timeout_secs: u64) -> Environment {
    let mut settings = HarnessConfig::default();
    settings.cluster.kind = ClusterKind::Fake;
    settings.namespace = NAMESPACE.to_string();
    settings.wait.timeout_secs = timeout_secs;
    settings.wait.interval_ms = 20;
    settings.capture.retry_delay_ms = 10;
    Environment::new(Cluster::Fake(cluster), settings).expect("fake environment")
}

/// Self-signed ECDSA certificate, PEM
pub fn ecdsa_pem(dns_name: &str) -> String {
    let params = CertificateParams::new(vec![dns_name.to_string()]).expect("params");
    let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).expect("key");
    params.self_signed(&key).expect("self signed").pem()
}

/// Upper bound for any single fake-cluster scenario
pub const SCENARIO_BUDGET: Duration = Duration::from_secs(20);
