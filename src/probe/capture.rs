//! Out-of-band artifact capture from a live sidecar proxy.
//!
//! Capture is two-phase: locate the proxy (a pod matching the workload
//! selector that runs the proxy container), then ask it to open a TLS session
//! to the target and dump what the peer presented. Only the dump is retried;
//! a missing proxy fails immediately.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::errors::CaptureError;
use crate::utils::{retry_with_backoff, RetryConfig};

/// ALPN the mesh proxies negotiate for mTLS between sidecars
pub const MESH_ALPN: &str = "istio";

/// Everything needed to reach a proxy and the peer it should dial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub namespace: String,
    pub selector: String,
    pub container: String,
    /// Cluster access credential
    pub kubeconfig: PathBuf,
    /// `host:port` the proxy connects to
    pub target: String,
}

/// A proxy located for a capture request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyHandle {
    pub pod: String,
    pub container: String,
}

/// Cluster-side operations behind [`capture`]
#[async_trait]
pub trait ArtifactCapturer: Send + Sync {
    /// Find the proxy container for the request's selector.
    async fn locate_proxy(&self, request: &CaptureRequest) -> Result<ProxyHandle, CaptureError>;

    /// One attempt at dumping the artifact; the error string is kept for diagnostics.
    async fn dump_artifact(
        &self,
        proxy: &ProxyHandle,
        request: &CaptureRequest,
    ) -> Result<Vec<u8>, String>;
}

/// Locate the proxy, then dump its artifact with bounded retries.
#[instrument(skip(capturer, retry), fields(selector = %request.selector, target = %request.target))]
pub async fn capture(
    capturer: &dyn ArtifactCapturer,
    request: &CaptureRequest,
    retry: &RetryConfig,
) -> Result<Vec<u8>, CaptureError> {
    let proxy = capturer.locate_proxy(request).await?;

    let bytes = retry_with_backoff(retry, |_| capturer.dump_artifact(&proxy, request))
        .await
        .map_err(|exhausted| CaptureError::ArtifactAbsent {
            selector: request.selector.clone(),
            target: request.target.clone(),
            attempts: exhausted.attempts,
            reason: exhausted.last_error,
        })?;

    info!(pod = %proxy.pod, bytes = bytes.len(), "Captured artifact from proxy");
    Ok(bytes)
}
