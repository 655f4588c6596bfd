//! Real cluster driven through `kubectl`.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::kubectl::{Kubectl, KubectlError};
use super::ConfigFileProvider;
use crate::applier::ConfigStore;
use crate::config::{ClusterSettings, ProbeSettings};
use crate::errors::{CaptureError, ConfigError, ProbeError};
use crate::probe::capture::{ArtifactCapturer, CaptureRequest, ProxyHandle, MESH_ALPN};
use crate::probe::{CallOutcome, ProbeRequest, ProbeTransport, Scheme};
use crate::template::{ResolvedConfig, ResourceRef};

/// Cluster reached with an explicit kubeconfig
#[derive(Debug, Clone)]
pub struct KubeCluster {
    kubectl: Kubectl,
    probe_container: String,
    probe_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: ObjectMeta,
    spec: PodSpec,
}

#[derive(Debug, Deserialize)]
struct PodSpec {
    #[serde(default)]
    containers: Vec<Container>,
}

#[derive(Debug, Deserialize)]
struct Container {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    generation: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectStatus {
    #[serde(default)]
    observed_generation: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Object {
    metadata: ObjectMeta,
    #[serde(default)]
    status: Option<ObjectStatus>,
}

impl Object {
    /// Controllers that report an observed generation must have caught up
    fn is_reconciled(&self) -> bool {
        match (self.metadata.generation, self.status.as_ref().and_then(|s| s.observed_generation)) {
            (Some(generation), Some(observed)) => observed >= generation,
            _ => true,
        }
    }
}

impl KubeCluster {
    pub fn new(kubectl: Kubectl, probe: &ProbeSettings) -> Self {
        Self {
            kubectl,
            probe_container: probe.container.clone(),
            probe_timeout_secs: probe.timeout_secs,
        }
    }

    /// Build from settings; `None` when no kubeconfig can be resolved
    pub fn from_settings(cluster: &ClusterSettings, probe: &ProbeSettings) -> Option<Self> {
        let kubeconfig = cluster.kubeconfig_path()?;
        let kubectl = Kubectl::new(&cluster.kubectl, kubeconfig, cluster.command_timeout());
        Some(Self::new(kubectl, probe))
    }

    /// First pod matching `selector`, optionally required to run `container`
    async fn find_pod(
        &self,
        kubectl: &Kubectl,
        namespace: &str,
        selector: &str,
        container: Option<&str>,
    ) -> Result<Option<String>, KubectlError> {
        let output = kubectl
            .run(namespace, &["get", "pods", "-n", namespace, "-l", selector, "-o", "json"], None)
            .await?;

        let pods: PodList = match serde_json::from_slice(&output.stdout) {
            Ok(pods) => pods,
            Err(e) => {
                warn!(error = %e, selector, "Unparseable pod list");
                return Ok(None);
            }
        };

        Ok(pods
            .items
            .into_iter()
            .find(|pod| match container {
                Some(wanted) => pod.spec.containers.iter().any(|c| c.name == wanted),
                None => true,
            })
            .map(|pod| pod.metadata.name))
    }
}

#[async_trait]
impl ConfigStore for KubeCluster {
    async fn submit(&self, namespace: &str, config: &ResolvedConfig) -> Result<(), ConfigError> {
        self.kubectl
            .run(namespace, &["apply", "-n", namespace, "-f", "-"], Some(config.yaml().as_bytes()))
            .await
            .map(|output| debug!(output = %output.stdout_str(), "kubectl apply"))
            .map_err(|e| ConfigError::Rejected {
                template: config.name().to_string(),
                namespace: namespace.to_string(),
                reason: e.reason(),
            })
    }

    async fn is_active(
        &self,
        namespace: &str,
        resource: &ResourceRef,
    ) -> Result<bool, ConfigError> {
        let kind = resource.kubectl_type();
        let namespace = resource.namespace_or(namespace);
        let observation = |reason: String| ConfigError::Observation {
            resource: resource.to_string(),
            reason,
        };

        let args = ["get", kind.as_str(), resource.name.as_str(), "-n", namespace, "-o", "json"];
        let output = match self.kubectl.run(namespace, &args, None).await {
            Ok(output) => output,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(observation(e.reason())),
        };

        let object: Object =
            serde_json::from_slice(&output.stdout).map_err(|e| observation(e.to_string()))?;
        Ok(object.metadata.name == resource.name && object.is_reconciled())
    }
}

#[async_trait]
impl ProbeTransport for KubeCluster {
    async fn send(&self, request: &ProbeRequest, call: u32) -> Result<CallOutcome, ProbeError> {
        let namespace = &request.target.namespace;
        let pod = match self.find_pod(&self.kubectl, namespace, &request.source.selector, None).await
        {
            Ok(Some(pod)) => pod,
            Ok(None) => {
                return Err(ProbeError::SourceNotFound {
                    selector: request.source.selector.clone(),
                    namespace: namespace.clone(),
                })
            }
            Err(e) => return Ok(CallOutcome::unreachable(call, e.reason())),
        };

        let url = request.url();
        let max_time = self.probe_timeout_secs.to_string();
        let mut args = vec![
            "exec",
            pod.as_str(),
            "-n",
            namespace.as_str(),
            "-c",
            self.probe_container.as_str(),
            "--",
            "curl",
            "-s",
            "-o",
            "/dev/null",
            "-w",
            "%{http_code}",
            "--max-time",
            max_time.as_str(),
        ];
        if request.scheme == Scheme::Https {
            args.push("-k");
        }
        args.push(url.as_str());

        let output = match self.kubectl.run(namespace, &args, None).await {
            Ok(output) => output,
            Err(e) => return Ok(CallOutcome::unreachable(call, e.reason())),
        };

        // curl reports 000 when no response arrived.
        match output.stdout_str().parse::<u16>() {
            Ok(0) | Err(_) => Ok(CallOutcome::unreachable(
                call,
                format!("curl from {} got no response (http_code '{}')", pod, output.stdout_str()),
            )),
            Ok(status) => Ok(CallOutcome::status(call, status)),
        }
    }
}

#[async_trait]
impl ArtifactCapturer for KubeCluster {
    async fn locate_proxy(&self, request: &CaptureRequest) -> Result<ProxyHandle, CaptureError> {
        let kubectl = self.kubectl.with_kubeconfig(&request.kubeconfig);
        let not_found = || CaptureError::ProxyNotFound {
            selector: request.selector.clone(),
            container: request.container.clone(),
            namespace: request.namespace.clone(),
        };

        match self
            .find_pod(&kubectl, &request.namespace, &request.selector, Some(&request.container))
            .await
        {
            Ok(Some(pod)) => Ok(ProxyHandle { pod, container: request.container.clone() }),
            Ok(None) => Err(not_found()),
            Err(e) => {
                warn!(error = %e, "Proxy lookup failed");
                Err(not_found())
            }
        }
    }

    async fn dump_artifact(
        &self,
        proxy: &ProxyHandle,
        request: &CaptureRequest,
    ) -> Result<Vec<u8>, String> {
        let kubectl = self.kubectl.with_kubeconfig(&request.kubeconfig);
        let args = [
            "exec",
            proxy.pod.as_str(),
            "-n",
            request.namespace.as_str(),
            "-c",
            proxy.container.as_str(),
            "--",
            "openssl",
            "s_client",
            "-showcerts",
            "-alpn",
            MESH_ALPN,
            "-connect",
            request.target.as_str(),
        ];
        kubectl
            .run(&request.namespace, &args, None)
            .await
            .map(|output| output.stdout)
            .map_err(|e| e.reason())
    }
}

impl ConfigFileProvider for KubeCluster {
    fn filename(&self) -> &Path {
        self.kubectl.kubeconfig()
    }
}
