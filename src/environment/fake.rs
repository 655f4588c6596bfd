//! In-memory cluster for dry runs and tests.
//!
//! Config becomes active after a configurable propagation delay, services
//! answer with scripted statuses, and proxies hand back registered artifacts.
//! [`FakeCluster::with_mesh_defaults`] sets up the two-workload echo layout
//! with a freshly issued workload certificate.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, SanType, PKCS_ECDSA_P256_SHA256,
    PKCS_ED25519,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use super::ConfigFileProvider;
use crate::applier::ConfigStore;
use crate::errors::{CaptureError, ConfigError, ProbeError};
use crate::probe::capture::{ArtifactCapturer, CaptureRequest, ProxyHandle};
use crate::probe::{CallOutcome, ProbeRequest, ProbeTransport};
use crate::template::{ResolvedConfig, ResourceRef};

/// Port the echo server's mesh listener is captured on
pub const SERVER_CAPTURE_PORT: u16 = 8091;

/// Trust domain of fake workload identities
pub const TRUST_DOMAIN: &str = "cluster.local";

/// Key algorithm of fake workload certificates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    #[default]
    Ecdsa,
    Ed25519,
}

/// Issue a workload certificate for `<namespace>/<service_account>`, signed by
/// a throwaway mesh CA, as a PEM leaf followed by the CA.
pub fn issue_workload_certificate(
    namespace: &str,
    service_account: &str,
    algorithm: KeyAlgorithm,
) -> Result<String, rcgen::Error> {
    let alg = match algorithm {
        KeyAlgorithm::Ecdsa => &PKCS_ECDSA_P256_SHA256,
        KeyAlgorithm::Ed25519 => &PKCS_ED25519,
    };

    let ca_key = KeyPair::generate_for(alg)?;
    let mut ca_params = CertificateParams::new(Vec::<String>::new())?;
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params.distinguished_name.push(DnType::OrganizationName, TRUST_DOMAIN);
    let ca = ca_params.self_signed(&ca_key)?;

    let key = KeyPair::generate_for(alg)?;
    let mut params = CertificateParams::new(Vec::<String>::new())?;
    params.distinguished_name = rcgen::DistinguishedName::new();
    let spiffe = format!("spiffe://{}/ns/{}/sa/{}", TRUST_DOMAIN, namespace, service_account);
    params.subject_alt_names.push(SanType::URI(spiffe.as_str().try_into()?));
    let leaf = params.signed_by(&key, &ca, &ca_key)?;

    Ok(format!("{}{}", leaf.pem(), ca.pem()))
}

/// Wrap certificate PEM the way `openssl s_client -showcerts` prints it
pub fn s_client_transcript(target: &str, pem: &str) -> Vec<u8> {
    format!(
        "CONNECTED(00000003)\n---\nCertificate chain for {}\n{}---\nALPN protocol: istio\n---\nDONE\n",
        target, pem
    )
    .into_bytes()
}

#[derive(Debug, Clone)]
struct FakeProxy {
    pod: String,
    container: String,
}

/// In-memory cluster state
#[derive(Debug, Default)]
pub struct FakeCluster {
    propagation_delay: Duration,
    rejected_kinds: HashSet<String>,
    /// (namespace, kind, name) -> instant the resource becomes active
    applied: DashMap<(String, String, String), Instant>,
    /// (namespace, selector) of workloads that can originate calls
    workloads: DashMap<(String, String), String>,
    /// `<service>.<namespace>` -> per-call statuses, cycled; `None` = no answer
    services: DashMap<String, Vec<Option<u16>>>,
    /// (namespace, selector) -> proxy
    proxies: DashMap<(String, String), FakeProxy>,
    /// (namespace, selector, target) -> artifact bytes
    artifacts: DashMap<(String, String, String), Vec<u8>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_propagation_delay(mut self, delay: Duration) -> Self {
        self.propagation_delay = delay;
        self
    }

    /// Refuse any submission containing `kind`
    pub fn reject_kind(mut self, kind: impl Into<String>) -> Self {
        self.rejected_kinds.insert(kind.into());
        self
    }

    /// Register a workload whose pods are named `<name>-0`
    pub fn with_workload(self, namespace: &str, name: &str) -> Self {
        self.workloads
            .insert((namespace.to_string(), format!("app={}", name)), format!("{}-0", name));
        self
    }

    pub fn with_service(self, namespace: &str, service: &str, status: u16) -> Self {
        self.with_service_statuses(namespace, service, vec![Some(status)])
    }

    pub fn with_service_statuses(
        self,
        namespace: &str,
        service: &str,
        statuses: Vec<Option<u16>>,
    ) -> Self {
        self.services.insert(format!("{}.{}", service, namespace), statuses);
        self
    }

    /// Attach a proxy container to the pods selected by `selector`
    pub fn with_proxy(self, namespace: &str, selector: &str, container: &str) -> Self {
        let pod = self
            .workloads
            .get(&(namespace.to_string(), selector.to_string()))
            .map(|pod| pod.clone())
            .unwrap_or_else(|| format!("{}-0", selector.trim_start_matches("app=")));
        self.proxies.insert(
            (namespace.to_string(), selector.to_string()),
            FakeProxy { pod, container: container.to_string() },
        );
        self
    }

    /// What the proxy for `selector` dumps when dialing `target`. Served once
    /// a proxy is registered for `selector`, in either order.
    pub fn with_artifact(
        self,
        namespace: &str,
        selector: &str,
        target: &str,
        artifact: impl Into<Vec<u8>>,
    ) -> Self {
        self.artifacts.insert(
            (namespace.to_string(), selector.to_string(), target.to_string()),
            artifact.into(),
        );
        self
    }

    /// `client` and `server` workloads with `istio-proxy` sidecars; the client
    /// proxy sees a certificate of `algorithm` when dialing the server.
    pub fn with_mesh_defaults(
        namespace: &str,
        algorithm: KeyAlgorithm,
    ) -> Result<Self, rcgen::Error> {
        let target = format!("server.{}:{}", namespace, SERVER_CAPTURE_PORT);
        let pem = issue_workload_certificate(namespace, "server", algorithm)?;

        Ok(Self::new()
            .with_workload(namespace, "client")
            .with_workload(namespace, "server")
            .with_service(namespace, "server", 200)
            .with_proxy(namespace, "app=client", "istio-proxy")
            .with_proxy(namespace, "app=server", "istio-proxy")
            .with_artifact(namespace, "app=client", &target, s_client_transcript(&target, &pem)))
    }

    /// Kubeconfig handed to capture requests
    pub fn kubeconfig(&self) -> PathBuf {
        self.filename().to_path_buf()
    }

    /// Number of resources submitted so far
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

fn resource_key(namespace: &str, resource: &ResourceRef) -> (String, String, String) {
    (resource.namespace_or(namespace).to_string(), resource.kind.clone(), resource.name.clone())
}

#[async_trait]
impl ConfigStore for FakeCluster {
    async fn submit(&self, namespace: &str, config: &ResolvedConfig) -> Result<(), ConfigError> {
        if let Some(rejected) =
            config.resources().iter().find(|r| self.rejected_kinds.contains(&r.kind))
        {
            return Err(ConfigError::Rejected {
                template: config.name().to_string(),
                namespace: namespace.to_string(),
                reason: format!("kind {} is not served by this cluster", rejected.kind),
            });
        }

        let ready_at = Instant::now() + self.propagation_delay;
        for resource in config.resources() {
            debug!(%resource, "Fake cluster stored resource");
            self.applied.insert(resource_key(namespace, resource), ready_at);
        }
        Ok(())
    }

    async fn is_active(
        &self,
        namespace: &str,
        resource: &ResourceRef,
    ) -> Result<bool, ConfigError> {
        Ok(self
            .applied
            .get(&resource_key(namespace, resource))
            .is_some_and(|ready_at| Instant::now() >= *ready_at))
    }
}

#[async_trait]
impl ProbeTransport for FakeCluster {
    async fn send(&self, request: &ProbeRequest, call: u32) -> Result<CallOutcome, ProbeError> {
        let namespace = &request.target.namespace;
        let source = (namespace.clone(), request.source.selector.clone());
        if !self.workloads.contains_key(&source) {
            return Err(ProbeError::SourceNotFound {
                selector: request.source.selector.clone(),
                namespace: namespace.clone(),
            });
        }

        let status = self.services.get(&request.target.host()).and_then(|statuses| {
            if statuses.is_empty() {
                None
            } else {
                statuses[(call as usize - 1) % statuses.len()]
            }
        });

        Ok(match status {
            Some(status) => CallOutcome::status(call, status),
            None => CallOutcome::unreachable(call, format!("no route to {}", request.target.host())),
        })
    }
}

#[async_trait]
impl ArtifactCapturer for FakeCluster {
    async fn locate_proxy(&self, request: &CaptureRequest) -> Result<ProxyHandle, CaptureError> {
        self.proxies
            .get(&(request.namespace.clone(), request.selector.clone()))
            .filter(|proxy| proxy.container == request.container)
            .map(|proxy| ProxyHandle { pod: proxy.pod.clone(), container: proxy.container.clone() })
            .ok_or_else(|| CaptureError::ProxyNotFound {
                selector: request.selector.clone(),
                container: request.container.clone(),
                namespace: request.namespace.clone(),
            })
    }

    async fn dump_artifact(
        &self,
        _proxy: &ProxyHandle,
        request: &CaptureRequest,
    ) -> Result<Vec<u8>, String> {
        self.artifacts
            .get(&(request.namespace.clone(), request.selector.clone(), request.target.clone()))
            .map(|artifact| artifact.clone())
            .ok_or_else(|| format!("connect to {}: Connection refused", request.target))
    }
}

impl ConfigFileProvider for FakeCluster {
    fn filename(&self) -> &Path {
        Path::new("/dev/null")
    }
}
