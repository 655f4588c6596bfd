//! # Error Types
//!
//! Step-level error taxonomy for the scenario harness using `thiserror`.
//! Every variant carries enough context (template, target, step) to diagnose
//! a failure without re-running the scenario.

use std::time::Duration;

use super::tls::{AssertionError, DecodeError};

/// Failures submitting declarative configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A `{{.Name}}` placeholder had no substitution value.
    #[error("template '{template}' has unresolved placeholder '{placeholder}'")]
    UnresolvedPlaceholder { template: String, placeholder: String },

    /// The rendered text is not a set of well-formed resource documents.
    #[error("template '{template}' rendered an invalid document: {reason}")]
    InvalidDocument { template: String, reason: String },

    /// The environment refused the submission.
    #[error("config '{template}' rejected in namespace '{namespace}': {reason}")]
    Rejected { template: String, namespace: String, reason: String },

    /// The environment could not be queried for the state of a resource.
    #[error("failed to observe {resource}: {reason}")]
    Observation { resource: String, reason: String },
}

/// A bounded wait elapsed before its condition held.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("TIMEOUT: '{operation}' not satisfied within {deadline:?}{}", observation_suffix(.last_observation))]
pub struct TimeoutError {
    pub operation: String,
    pub deadline: Duration,
    pub last_observation: Option<String>,
}

fn observation_suffix(observation: &Option<String>) -> String {
    observation.as_ref().map(|o| format!(" (last observation: {o})")).unwrap_or_default()
}

impl TimeoutError {
    pub fn new(operation: impl Into<String>, deadline: Duration) -> Self {
        Self { operation: operation.into(), deadline, last_observation: None }
    }

    pub fn with_observation(mut self, observation: Option<String>) -> Self {
        self.last_observation = observation;
        self
    }
}

/// Failures issuing probe calls.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The request violates its own invariants (e.g. zero calls).
    #[error("invalid probe request: {reason}")]
    InvalidRequest { reason: String },

    /// No workload matched the probe source selector.
    #[error("no source workload matches selector '{selector}' in namespace '{namespace}'")]
    SourceNotFound { selector: String, namespace: String },

    /// The target did not respond.
    #[error("call {call} to {target} got no response: {reason}")]
    Unreachable { target: String, call: u32, reason: String },

    /// A response was received but failed validation.
    #[error("call {call} to {target} returned status {status}, expected 2xx")]
    BadStatus { target: String, call: u32, status: u16 },
}

/// Failures retrieving an artifact from a live proxy.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No pod/container matches the workload selector.
    #[error("no proxy container '{container}' for selector '{selector}' in namespace '{namespace}'")]
    ProxyNotFound { selector: String, container: String, namespace: String },

    /// The proxy was found but never yielded the artifact.
    #[error("proxy for '{selector}' yielded no artifact for {target} after {attempts} attempts: {reason}")]
    ArtifactAbsent { selector: String, target: String, attempts: u32, reason: String },
}

/// Any failure a single scenario step can produce.
#[derive(thiserror::Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Assertion(#[from] AssertionError),

    /// An earlier step did not leave behind what this step consumes.
    #[error("missing precondition: {0}")]
    MissingPrecondition(String),
}

/// Terminal failure of a scenario run.
#[derive(thiserror::Error, Debug)]
pub enum ScenarioError {
    /// The first failing step; later steps were not executed.
    #[error("scenario '{scenario}' failed at step {index} '{step}': {source}")]
    StepFailed {
        scenario: String,
        step: String,
        index: usize,
        #[source]
        source: StepError,
    },

    /// Scenarios are single-shot; a passed or failed scenario cannot be rerun.
    #[error("scenario '{scenario}' is {state}, only pending scenarios can run")]
    NotPending { scenario: String, state: String },

    /// Nothing to execute.
    #[error("scenario '{scenario}' has no steps")]
    Empty { scenario: String },
}

impl ScenarioError {
    /// The step error behind a step failure, if any.
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            ScenarioError::StepFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Name of the failing step, if any.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            ScenarioError::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }
}
