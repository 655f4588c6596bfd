//! Probe calls issued from the harness process.
//!
//! Useful when the harness itself runs inside the mesh, or when the target is
//! reachable through a port-forward (`Target::with_address`). For `https`
//! calls the peer certificate is kept so it can be inspected like a
//! sidecar-captured one. Server certificates are not verified: the probe
//! observes what is presented, it does not authenticate it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{CallOutcome, ProbeRequest, ProbeTransport};
use crate::errors::ProbeError;

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .tls_info(true)
            .build()
            .map_err(|e| ProbeError::InvalidRequest {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProbeTransport for HttpTransport {
    async fn send(&self, request: &ProbeRequest, call: u32) -> Result<CallOutcome, ProbeError> {
        let url = request.url();
        debug!(%url, call, "Sending direct probe");

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            // Transport-level failures mean the target did not answer this call.
            Err(e) => return Ok(CallOutcome::unreachable(call, e.to_string())),
        };

        let peer_certificate = response
            .extensions()
            .get::<reqwest::tls::TlsInfo>()
            .and_then(|info| info.peer_certificate())
            .map(<[u8]>::to_vec);

        Ok(CallOutcome {
            call,
            status: Some(response.status().as_u16()),
            error: None,
            peer_certificate,
        })
    }
}
