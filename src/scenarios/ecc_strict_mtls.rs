//! Strict mTLS between two workloads must run on ECDSA workload certificates.
//!
//! Mesh-wide STRICT peer authentication plus an `ISTIO_MUTUAL` destination
//! rule for the server, one plain HTTP call from client to server, then the
//! certificate the client's sidecar sees from the server is captured and its
//! public key algorithm checked.

use crate::certificate::{Expectation, PublicKeyAlgorithm};
use crate::environment::fake::SERVER_CAPTURE_PORT;
use crate::probe::{ProbeRequest, Target, Workload};
use crate::scenario::{
    ApplyConfig, AssertCertificate, CallService, CaptureCertificate, DecodeCertificate, Scenario,
    WaitForConfig,
};
use crate::template::ConfigTemplate;

pub const NAME: &str = "ecc-strict-mtls";
pub const FEATURE: &str = "security.peer.ecc-signature-algorithm";

/// Service port named `http` on the echo server
pub const SERVER_HTTP_PORT: u16 = 8090;

const NAMESPACE_PLACEHOLDER: &str = "AppNamespace";

pub const PEER_AUTHENTICATION: &str = r#"
apiVersion: security.istio.io/v1beta1
kind: PeerAuthentication
metadata:
  name: default
  namespace: {{.AppNamespace}}
spec:
  mtls:
    mode: STRICT
"#;

pub const DESTINATION_RULE: &str = r#"
apiVersion: networking.istio.io/v1alpha3
kind: DestinationRule
metadata:
  name: server
  namespace: {{.AppNamespace}}
spec:
  host: "server.{{.AppNamespace}}.svc.cluster.local"
  trafficPolicy:
    tls:
      mode: ISTIO_MUTUAL
"#;

/// Policy templates bound to `namespace`, in apply order
pub fn templates(namespace: &str) -> Vec<ConfigTemplate> {
    vec![
        ConfigTemplate::new("peer-authentication", PEER_AUTHENTICATION)
            .with_value(NAMESPACE_PLACEHOLDER, namespace),
        ConfigTemplate::new("destination-rule", DESTINATION_RULE)
            .with_value(NAMESPACE_PLACEHOLDER, namespace),
    ]
}

pub fn scenario(namespace: &str) -> Scenario {
    let mut scenario = Scenario::new(NAME).with_feature(FEATURE);
    for template in templates(namespace) {
        let name = template.name().to_string();
        scenario = scenario.step(ApplyConfig::new(template)).step(WaitForConfig::new(name));
    }

    let call = ProbeRequest::new(
        Workload::app("client"),
        Target::new("server", namespace, "http", SERVER_HTTP_PORT),
    );

    scenario
        .step(CallService::new(call))
        .step(CaptureCertificate::new(
            "app=client",
            format!("server.{}:{}", namespace, SERVER_CAPTURE_PORT),
        ))
        .step(DecodeCertificate)
        .step(AssertCertificate::new(Expectation::PublicKeyAlgorithm(PublicKeyAlgorithm::Ecdsa)))
}
