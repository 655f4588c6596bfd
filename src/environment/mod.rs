//! # Environment
//!
//! The explicit handle every scenario step receives. It bundles the cluster,
//! the application namespace and the harness settings, and hands out the
//! capabilities steps need (config store, probe transport, artifact capturer).
//!
//! Cluster variants form a closed set. [`Cluster`] dispatches each capability
//! by `match`, so callers never need to know which variant they hold to get,
//! for example, the kubeconfig path.

pub mod fake;
pub mod kube;
pub mod kubectl;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::applier::{ConfigApplier, ConfigStore};
use crate::config::{ClusterKind, HarnessConfig, ProbeMode};
use crate::errors::{CaptureError, ConfigError, Error, ProbeError, Result};
use crate::probe::capture::{ArtifactCapturer, CaptureRequest, ProxyHandle};
use crate::probe::{CallOutcome, HttpTransport, ProbeRequest, ProbeTransport};
use crate::template::{ResolvedConfig, ResourceRef};
use crate::utils::RetryConfig;

pub use fake::{FakeCluster, KeyAlgorithm};
pub use kube::KubeCluster;
pub use kubectl::{Kubectl, KubectlError};

/// Provides the cluster access credential file
pub trait ConfigFileProvider {
    fn filename(&self) -> &Path;
}

/// Closed set of cluster variants
#[derive(Debug)]
pub enum Cluster {
    Kube(KubeCluster),
    Fake(FakeCluster),
}

impl Cluster {
    pub fn kind(&self) -> ClusterKind {
        match self {
            Cluster::Kube(_) => ClusterKind::Kube,
            Cluster::Fake(_) => ClusterKind::Fake,
        }
    }
}

impl ConfigFileProvider for Cluster {
    fn filename(&self) -> &Path {
        match self {
            Cluster::Kube(cluster) => cluster.filename(),
            Cluster::Fake(cluster) => cluster.filename(),
        }
    }
}

#[async_trait]
impl ConfigStore for Cluster {
    async fn submit(
        &self,
        namespace: &str,
        config: &ResolvedConfig,
    ) -> std::result::Result<(), ConfigError> {
        match self {
            Cluster::Kube(cluster) => cluster.submit(namespace, config).await,
            Cluster::Fake(cluster) => cluster.submit(namespace, config).await,
        }
    }

    async fn is_active(
        &self,
        namespace: &str,
        resource: &ResourceRef,
    ) -> std::result::Result<bool, ConfigError> {
        match self {
            Cluster::Kube(cluster) => cluster.is_active(namespace, resource).await,
            Cluster::Fake(cluster) => cluster.is_active(namespace, resource).await,
        }
    }
}

#[async_trait]
impl ProbeTransport for Cluster {
    async fn send(
        &self,
        request: &ProbeRequest,
        call: u32,
    ) -> std::result::Result<CallOutcome, ProbeError> {
        match self {
            Cluster::Kube(cluster) => cluster.send(request, call).await,
            Cluster::Fake(cluster) => cluster.send(request, call).await,
        }
    }
}

#[async_trait]
impl ArtifactCapturer for Cluster {
    async fn locate_proxy(
        &self,
        request: &CaptureRequest,
    ) -> std::result::Result<ProxyHandle, CaptureError> {
        match self {
            Cluster::Kube(cluster) => cluster.locate_proxy(request).await,
            Cluster::Fake(cluster) => cluster.locate_proxy(request).await,
        }
    }

    async fn dump_artifact(
        &self,
        proxy: &ProxyHandle,
        request: &CaptureRequest,
    ) -> std::result::Result<Vec<u8>, String> {
        match self {
            Cluster::Kube(cluster) => cluster.dump_artifact(proxy, request).await,
            Cluster::Fake(cluster) => cluster.dump_artifact(proxy, request).await,
        }
    }
}

/// Everything a scenario run needs from the outside world
#[derive(Debug)]
pub struct Environment {
    cluster: Cluster,
    namespace: String,
    settings: HarnessConfig,
    direct: Option<HttpTransport>,
}

impl Environment {
    /// Wrap a cluster; the app namespace comes from `settings`
    pub fn new(cluster: Cluster, settings: HarnessConfig) -> Result<Self> {
        let direct = match settings.probe.mode {
            ProbeMode::Direct => Some(
                HttpTransport::new(settings.probe.timeout())
                    .map_err(|e| Error::config(e.to_string()))?,
            ),
            ProbeMode::Exec => None,
        };

        info!(
            cluster = ?cluster.kind(),
            namespace = %settings.namespace,
            probe_mode = ?settings.probe.mode,
            "Environment ready"
        );

        Ok(Self { namespace: settings.namespace.clone(), cluster, settings, direct })
    }

    /// Build the cluster variant the settings select. A fake cluster gets the
    /// default mesh layout serving ECDSA workload certificates.
    pub fn from_config(settings: HarnessConfig) -> Result<Self> {
        let cluster = match settings.cluster.kind {
            ClusterKind::Kube => Cluster::Kube(
                KubeCluster::from_settings(&settings.cluster, &settings.probe).ok_or_else(
                    || Error::config("No kubeconfig: set cluster.kubeconfig, KUBECONFIG or HOME"),
                )?,
            ),
            ClusterKind::Fake => Cluster::Fake(
                FakeCluster::with_mesh_defaults(&settings.namespace, KeyAlgorithm::Ecdsa)
                    .map_err(|e| Error::internal(format!("Failed to issue fake certificate: {}", e)))?,
            ),
        };
        Self::new(cluster, settings)
    }

    /// In-memory environment with short waits and retry delays
    pub fn fake(cluster: FakeCluster, namespace: impl Into<String>) -> Self {
        let mut settings = HarnessConfig::default();
        settings.cluster.kind = ClusterKind::Fake;
        settings.namespace = namespace.into();
        settings.wait.timeout_secs = 5;
        settings.wait.interval_ms = 10;
        settings.capture.retry_delay_ms = 10;

        Self {
            namespace: settings.namespace.clone(),
            cluster: Cluster::Fake(cluster),
            settings,
            direct: None,
        }
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn settings(&self) -> &HarnessConfig {
        &self.settings
    }

    /// Credential file for out-of-band capture
    pub fn kubeconfig(&self) -> PathBuf {
        self.cluster.filename().to_path_buf()
    }

    pub fn applier(&self) -> ConfigApplier<'_> {
        ConfigApplier::new(&self.cluster, self.settings.wait.timeout(), self.settings.wait.interval())
    }

    /// Direct transport when configured, the cluster otherwise
    pub fn transport(&self) -> &dyn ProbeTransport {
        match &self.direct {
            Some(direct) => direct,
            None => &self.cluster,
        }
    }

    pub fn capturer(&self) -> &dyn ArtifactCapturer {
        &self.cluster
    }

    pub fn capture_retry(&self) -> RetryConfig {
        RetryConfig::attempts(self.settings.capture.attempts, self.settings.capture.retry_delay())
            .with_description("proxy certificate dump")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_environment_defaults() {
        let env = Environment::fake(FakeCluster::new(), "echo");
        assert_eq!(env.namespace(), "echo");
        assert_eq!(env.cluster().kind(), ClusterKind::Fake);
        assert_eq!(env.kubeconfig(), PathBuf::from("/dev/null"));
        assert_eq!(env.capture_retry().max_attempts, 3);
    }

    #[test]
    fn test_from_config_fake() {
        let mut settings = HarnessConfig::default();
        settings.cluster.kind = ClusterKind::Fake;
        settings.namespace = "mtls".into();
        let env = Environment::from_config(settings).unwrap();
        assert_eq!(env.namespace(), "mtls");
        assert!(matches!(env.cluster(), Cluster::Fake(_)));
    }

    #[test]
    fn test_kube_filename_dispatch() {
        let kubectl = Kubectl::new("kubectl", "/tmp/kind-config", std::time::Duration::from_secs(5));
        let cluster = Cluster::Kube(KubeCluster::new(kubectl, &Default::default()));
        assert_eq!(cluster.filename(), Path::new("/tmp/kind-config"));
    }

    #[test]
    fn test_direct_mode_builds_http_transport() {
        let mut settings = HarnessConfig::default();
        settings.cluster.kind = ClusterKind::Fake;
        settings.probe.mode = ProbeMode::Direct;
        let env = Environment::new(Cluster::Fake(FakeCluster::new()), settings).unwrap();
        assert!(env.direct.is_some());
    }
}
