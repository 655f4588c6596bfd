//! Built-in scenario steps.

use async_trait::async_trait;
use tracing::info;

use super::{ScenarioContext, Step};
use crate::certificate::{self, Expectation};
use crate::errors::StepError;
use crate::probe::capture::{self, CaptureRequest};
use crate::probe::{ProbeExecutor, ProbeRequest};
use crate::template::ConfigTemplate;

/// Submit a template into the environment's app namespace
pub struct ApplyConfig {
    template: ConfigTemplate,
}

impl ApplyConfig {
    pub fn new(template: ConfigTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl Step for ApplyConfig {
    fn name(&self) -> String {
        format!("apply {}", self.template.name())
    }

    async fn execute(&self, ctx: &mut ScenarioContext<'_>) -> Result<(), StepError> {
        let env = ctx.env();
        let config = env.applier().apply(env.namespace(), &self.template).await?;
        ctx.record_config(config);
        Ok(())
    }
}

/// Block until a previously applied config is active
pub struct WaitForConfig {
    config: String,
}

impl WaitForConfig {
    /// `config` is the template name given to [`ApplyConfig`]
    pub fn new(config: impl Into<String>) -> Self {
        Self { config: config.into() }
    }
}

#[async_trait]
impl Step for WaitForConfig {
    fn name(&self) -> String {
        format!("wait for {}", self.config)
    }

    async fn execute(&self, ctx: &mut ScenarioContext<'_>) -> Result<(), StepError> {
        let env = ctx.env();
        let config = ctx.config(&self.config)?;
        env.applier().wait_for_active(env.namespace(), config).await?;
        Ok(())
    }
}

/// Issue a probe batch and require every call to succeed
pub struct CallService {
    request: ProbeRequest,
}

impl CallService {
    pub fn new(request: ProbeRequest) -> Self {
        Self { request }
    }
}

#[async_trait]
impl Step for CallService {
    fn name(&self) -> String {
        format!("call {} from {}", self.request.target.service, self.request.source.name)
    }

    async fn execute(&self, ctx: &mut ScenarioContext<'_>) -> Result<(), StepError> {
        let result = ProbeExecutor::new(ctx.env().transport()).call(&self.request).await?;
        let checked = result.check_ok();
        ctx.set_probe_result(result);
        checked.map_err(StepError::from)
    }
}

/// Capture the certificate a workload's proxy is presented by a peer
pub struct CaptureCertificate {
    selector: String,
    container: Option<String>,
    target: String,
}

impl CaptureCertificate {
    /// Capture through the proxy of the pods matching `selector`, dialing
    /// `target` (`host:port`). The proxy container comes from the capture
    /// settings unless overridden.
    pub fn new(selector: impl Into<String>, target: impl Into<String>) -> Self {
        Self { selector: selector.into(), container: None, target: target.into() }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }
}

#[async_trait]
impl Step for CaptureCertificate {
    fn name(&self) -> String {
        format!("capture certificate {} -> {}", self.selector, self.target)
    }

    async fn execute(&self, ctx: &mut ScenarioContext<'_>) -> Result<(), StepError> {
        let env = ctx.env();
        let request = CaptureRequest {
            namespace: env.namespace().to_string(),
            selector: self.selector.clone(),
            container: self
                .container
                .clone()
                .unwrap_or_else(|| env.settings().capture.container.clone()),
            kubeconfig: env.kubeconfig(),
            target: self.target.clone(),
        };

        let artifact = capture::capture(env.capturer(), &request, &env.capture_retry()).await?;
        ctx.set_artifact(artifact);
        Ok(())
    }
}

/// Decode the captured artifact into a certificate
pub struct DecodeCertificate;

#[async_trait]
impl Step for DecodeCertificate {
    fn name(&self) -> String {
        "decode certificate".to_string()
    }

    async fn execute(&self, ctx: &mut ScenarioContext<'_>) -> Result<(), StepError> {
        let cert = certificate::decode(ctx.artifact()?)?;
        info!(
            public_key_algorithm = %cert.public_key_algorithm,
            spiffe_id = cert.spiffe_id().unwrap_or("-"),
            not_after = %cert.not_after,
            "Decoded peer certificate"
        );
        ctx.set_certificate(cert);
        Ok(())
    }
}

/// Check one property of the decoded certificate
pub struct AssertCertificate {
    expectation: Expectation,
}

impl AssertCertificate {
    pub fn new(expectation: Expectation) -> Self {
        Self { expectation }
    }
}

#[async_trait]
impl Step for AssertCertificate {
    fn name(&self) -> String {
        format!("assert {}", self.expectation.property())
    }

    async fn execute(&self, ctx: &mut ScenarioContext<'_>) -> Result<(), StepError> {
        certificate::assert(ctx.certificate()?, &self.expectation)?;
        Ok(())
    }
}
