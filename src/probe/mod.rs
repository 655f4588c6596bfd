//! # Probe Executor
//!
//! Issues application-level calls from a source workload to a target service
//! and reports whether every call succeeded. Transports decide where the call
//! originates: inside the source pod (`kubectl exec`), from the harness
//! process ([`http::HttpTransport`]), or from an in-memory cluster.
//!
//! The [`capture`] submodule retrieves out-of-band artifacts, such as the
//! certificate a sidecar proxy presented, from a live proxy container.

pub mod capture;
pub mod http;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ProbeError;

pub use capture::{ArtifactCapturer, CaptureRequest};
pub use http::HttpTransport;

/// A workload identified by a label selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub selector: String,
}

impl Workload {
    /// Workload selected by the conventional `app=<name>` label
    pub fn app(name: impl Into<String>) -> Self {
        let name = name.into();
        let selector = format!("app={}", name);
        Self { name, selector }
    }
}

/// Call target: a service port, optionally reached through an explicit address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub service: String,
    pub namespace: String,
    pub port_name: String,
    pub port: u16,
    /// Overrides `<service>.<namespace>:<port>` (port-forwards, local runs)
    pub address: Option<String>,
}

impl Target {
    pub fn new(
        service: impl Into<String>,
        namespace: impl Into<String>,
        port_name: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            service: service.into(),
            namespace: namespace.into(),
            port_name: port_name.into(),
            port,
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// In-mesh host name
    pub fn host(&self) -> String {
        format!("{}.{}", self.service, self.namespace)
    }

    /// `host:port` the call connects to
    pub fn authority(&self) -> String {
        self.address.clone().unwrap_or_else(|| format!("{}:{}", self.host(), self.port))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host(), self.port, self.port_name)
    }
}

/// Application protocol for a probe call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One batch of calls from `source` to `target`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub source: Workload,
    pub target: Target,
    pub scheme: Scheme,
    pub path: String,
    pub count: u32,
}

impl ProbeRequest {
    /// Single HTTP call to `/`
    pub fn new(source: Workload, target: Target) -> Self {
        Self { source, target, scheme: Scheme::Http, path: "/".to_string(), count: 1 }
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}{}", self.scheme, self.target.authority(), path)
    }

    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.count == 0 {
            return Err(ProbeError::InvalidRequest {
                reason: format!("call count must be at least 1 for {}", self.target),
            });
        }
        if self.source.selector.trim().is_empty() {
            return Err(ProbeError::InvalidRequest {
                reason: "source selector cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// What a single call observed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallOutcome {
    /// 1-based position in the batch
    pub call: u32,
    /// HTTP status, `None` when nothing answered
    pub status: Option<u16>,
    pub error: Option<String>,
    /// DER bytes of the peer certificate seen on a TLS call
    pub peer_certificate: Option<Vec<u8>>,
}

impl CallOutcome {
    pub fn status(call: u32, status: u16) -> Self {
        Self { call, status: Some(status), ..Default::default() }
    }

    pub fn unreachable(call: u32, error: impl Into<String>) -> Self {
        Self { call, status: None, error: Some(error.into()), peer_certificate: None }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, Some(status) if (200..300).contains(&status))
    }
}

/// Aggregate result of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub target: String,
    pub success: bool,
    pub error: Option<String>,
    pub calls: Vec<CallOutcome>,
    /// PEM of the first peer certificate observed, if any call was TLS
    pub artifact: Option<Vec<u8>>,
}

impl ProbeResult {
    fn from_calls(target: String, calls: Vec<CallOutcome>) -> Self {
        let first_failure = calls.iter().find(|c| !c.is_ok());
        let error = first_failure.map(|c| match (c.status, &c.error) {
            (Some(status), _) => format!("call {} returned status {}", c.call, status),
            (None, Some(e)) => format!("call {} got no response: {}", c.call, e),
            (None, None) => format!("call {} got no response", c.call),
        });
        let artifact = calls
            .iter()
            .find_map(|c| c.peer_certificate.as_deref())
            .map(|der| crate::certificate::encode_pem(der).into_bytes());

        Self { target, success: first_failure.is_none(), error, calls, artifact }
    }

    /// Fail with the first call that did not succeed
    pub fn check_ok(&self) -> Result<(), ProbeError> {
        match self.calls.iter().find(|c| !c.is_ok()) {
            None => Ok(()),
            Some(CallOutcome { call, status: Some(status), .. }) => Err(ProbeError::BadStatus {
                target: self.target.clone(),
                call: *call,
                status: *status,
            }),
            Some(CallOutcome { call, error, .. }) => Err(ProbeError::Unreachable {
                target: self.target.clone(),
                call: *call,
                reason: error.clone().unwrap_or_else(|| "no response".to_string()),
            }),
        }
    }
}

/// Performs a single call of a probe batch
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// `call` is the 1-based index within the batch. An unanswered call is an
    /// `Ok` outcome without a status; `Err` is reserved for failures that make
    /// the whole batch meaningless (e.g. the source workload does not exist).
    async fn send(&self, request: &ProbeRequest, call: u32) -> Result<CallOutcome, ProbeError>;
}

/// Runs probe batches over a transport
pub struct ProbeExecutor<'a> {
    transport: &'a dyn ProbeTransport,
}

impl<'a> ProbeExecutor<'a> {
    pub fn new(transport: &'a dyn ProbeTransport) -> Self {
        Self { transport }
    }

    /// Perform exactly `request.count` calls; success only if all succeed.
    pub async fn call(&self, request: &ProbeRequest) -> Result<ProbeResult, ProbeError> {
        request.validate()?;

        let target = request.target.to_string();
        let mut calls = Vec::new();

        for call in 1..=request.count {
            let outcome = self.transport.send(request, call).await?;
            debug!(
                source = %request.source.name,
                target = %target,
                call,
                status = ?outcome.status,
                "Probe call finished"
            );
            calls.push(outcome);
        }

        let result = ProbeResult::from_calls(target, calls);
        if result.success {
            info!(
                source = %request.source.name,
                target = %result.target,
                count = request.count,
                "Probe batch succeeded"
            );
        } else {
            warn!(
                source = %request.source.name,
                target = %result.target,
                error = ?result.error,
                "Probe batch failed"
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays scripted statuses; `None` means the call got no answer.
    struct Scripted {
        statuses: Vec<Option<u16>>,
        sent: Mutex<Vec<u32>>,
    }

    impl Scripted {
        fn new(statuses: Vec<Option<u16>>) -> Self {
            Self { statuses, sent: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ProbeTransport for Scripted {
        async fn send(&self, _request: &ProbeRequest, call: u32) -> Result<CallOutcome, ProbeError> {
            self.sent.lock().unwrap().push(call);
            Ok(match self.statuses[(call - 1) as usize] {
                Some(status) => CallOutcome::status(call, status),
                None => CallOutcome::unreachable(call, "connection refused"),
            })
        }
    }

    fn request(count: u32) -> ProbeRequest {
        ProbeRequest::new(Workload::app("client"), Target::new("server", "echo", "http", 8091))
            .with_count(count)
    }

    #[test]
    fn test_url_and_authority() {
        let req = request(1).with_path("health");
        assert_eq!(req.url(), "http://server.echo:8091/health");

        let req = req.with_scheme(Scheme::Https);
        let req = ProbeRequest {
            target: req.target.clone().with_address("127.0.0.1:18091"),
            ..req
        };
        assert_eq!(req.url(), "https://127.0.0.1:18091/health");
        assert_eq!(Workload::app("client").selector, "app=client");
    }

    #[tokio::test]
    async fn test_zero_count_rejected() {
        let transport = Scripted::new(vec![]);
        let err = ProbeExecutor::new(&transport).call(&request(0)).await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidRequest { .. }));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_calls_succeed() {
        let transport = Scripted::new(vec![Some(200), Some(204), Some(200)]);
        let result = ProbeExecutor::new(&transport).call(&request(3)).await.unwrap();
        assert!(result.success);
        assert!(result.check_ok().is_ok());
        assert_eq!(*transport.sent.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_single_failure_fails_batch_but_all_calls_run() {
        let transport = Scripted::new(vec![Some(200), Some(503), Some(200)]);
        let result = ProbeExecutor::new(&transport).call(&request(3)).await.unwrap();
        assert!(!result.success);
        assert_eq!(transport.sent.lock().unwrap().len(), 3);
        assert_eq!(
            result.check_ok().unwrap_err(),
            ProbeError::BadStatus { target: result.target.clone(), call: 2, status: 503 }
        );
    }

    #[tokio::test]
    async fn test_unanswered_call_is_unreachable() {
        let transport = Scripted::new(vec![None, Some(200)]);
        let result = ProbeExecutor::new(&transport).call(&request(2)).await.unwrap();
        let err = result.check_ok().unwrap_err();
        assert!(matches!(err, ProbeError::Unreachable { call: 1, ref reason, .. } if reason == "connection refused"));
        assert_eq!(result.error.as_deref(), Some("call 1 got no response: connection refused"));
    }

    struct NoSource;

    #[async_trait]
    impl ProbeTransport for NoSource {
        async fn send(&self, request: &ProbeRequest, _call: u32) -> Result<CallOutcome, ProbeError> {
            Err(ProbeError::SourceNotFound {
                selector: request.source.selector.clone(),
                namespace: request.target.namespace.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_huge_count_stops_at_batch_failure() {
        let err = ProbeExecutor::new(&NoSource).call(&request(u32::MAX)).await.unwrap_err();
        assert!(matches!(err, ProbeError::SourceNotFound { .. }));
    }
}
