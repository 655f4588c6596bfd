//! # Scenario Runner
//!
//! A scenario is an ordered list of steps run once against an
//! [`Environment`]. Steps execute strictly in sequence and the first failure
//! ends the run; the error names the failing step and carries its cause.
//!
//! ```text
//! Pending ──run()──> Running ──all steps ok──> Passed
//!                       └─────first failure──> Failed
//! ```
//!
//! Steps share a per-run [`ScenarioContext`]: the environment handle plus the
//! outputs earlier steps leave for later ones (applied configs, the captured
//! artifact, the decoded certificate).

pub mod steps;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::certificate::Certificate;
use crate::environment::Environment;
use crate::errors::{ScenarioError, StepError};
use crate::probe::ProbeResult;
use crate::step_span;
use crate::template::ResolvedConfig;

pub use steps::{
    ApplyConfig, AssertCertificate, CallService, CaptureCertificate, DecodeCertificate,
    WaitForConfig,
};

/// Lifecycle of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioState {
    Pending,
    Running,
    Passed,
    Failed,
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            ScenarioState::Pending => "pending",
            ScenarioState::Running => "running",
            ScenarioState::Passed => "passed",
            ScenarioState::Failed => "failed",
        };
        f.write_str(state)
    }
}

/// Per-run state shared between steps
pub struct ScenarioContext<'a> {
    env: &'a Environment,
    run_id: Uuid,
    configs: BTreeMap<String, ResolvedConfig>,
    probe: Option<ProbeResult>,
    artifact: Option<Vec<u8>>,
    certificate: Option<Certificate>,
}

impl<'a> ScenarioContext<'a> {
    pub fn new(env: &'a Environment, run_id: Uuid) -> Self {
        Self { env, run_id, configs: BTreeMap::new(), probe: None, artifact: None, certificate: None }
    }

    pub fn env(&self) -> &'a Environment {
        self.env
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record_config(&mut self, config: ResolvedConfig) {
        self.configs.insert(config.name().to_string(), config);
    }

    /// A config applied earlier in this run, by template name
    pub fn config(&self, name: &str) -> Result<&ResolvedConfig, StepError> {
        self.configs
            .get(name)
            .ok_or_else(|| StepError::MissingPrecondition(format!("config '{}' was not applied", name)))
    }

    pub fn set_probe_result(&mut self, result: ProbeResult) {
        self.probe = Some(result);
    }

    pub fn set_artifact(&mut self, artifact: Vec<u8>) {
        self.artifact = Some(artifact);
    }

    /// The captured artifact, else the peer certificate seen by the last
    /// `https` probe batch
    pub fn artifact(&self) -> Result<&[u8], StepError> {
        self.artifact
            .as_deref()
            .or_else(|| self.probe.as_ref().and_then(|probe| probe.artifact.as_deref()))
            .ok_or_else(|| StepError::MissingPrecondition("no artifact was captured".to_string()))
    }

    pub fn set_certificate(&mut self, certificate: Certificate) {
        self.certificate = Some(certificate);
    }

    pub fn certificate(&self) -> Result<&Certificate, StepError> {
        self.certificate
            .as_ref()
            .ok_or_else(|| StepError::MissingPrecondition("no certificate was decoded".to_string()))
    }
}

/// One unit of scenario work
#[async_trait]
pub trait Step: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> String;

    async fn execute(&self, ctx: &mut ScenarioContext<'_>) -> Result<(), StepError>;
}

/// Outcome of a single step in a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Passed,
    Failed,
    NotRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// 1-based position in the scenario
    pub index: usize,
    pub name: String,
    pub outcome: StepOutcome,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub state: ScenarioState,
    pub duration_ms: u64,
    pub steps: Vec<StepReport>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.state == ScenarioState::Passed
    }

    /// The step that failed, if any
    pub fn failed_step(&self) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.outcome == StepOutcome::Failed)
    }
}

/// An ordered, single-shot list of steps
pub struct Scenario {
    name: String,
    feature: Option<String>,
    steps: Vec<Box<dyn Step>>,
    state: ScenarioState,
    report: Option<ScenarioReport>,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .field("state", &self.state)
            .finish()
    }
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), feature: None, steps: Vec::new(), state: ScenarioState::Pending, report: None }
    }

    /// Feature label the scenario covers, e.g. `security.peer.ecc-signature-algorithm`
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn feature(&self) -> Option<&str> {
        self.feature.as_deref()
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Report of the last run, available after both passing and failing runs
    pub fn report(&self) -> Option<&ScenarioReport> {
        self.report.as_ref()
    }

    /// Run every step in order, stopping at the first failure.
    pub async fn run(&mut self, env: &Environment) -> Result<ScenarioReport, ScenarioError> {
        if self.state != ScenarioState::Pending {
            return Err(ScenarioError::NotPending {
                scenario: self.name.clone(),
                state: self.state.to_string(),
            });
        }
        if self.steps.is_empty() {
            return Err(ScenarioError::Empty { scenario: self.name.clone() });
        }

        self.state = ScenarioState::Running;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        info!(scenario = %self.name, %run_id, steps = self.steps.len(), "Scenario started");

        let mut ctx = ScenarioContext::new(env, run_id);
        let mut reports: Vec<StepReport> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| StepReport {
                index: i + 1,
                name: step.name(),
                outcome: StepOutcome::NotRun,
                duration_ms: 0,
                error: None,
            })
            .collect();

        let mut failure = None;
        for (i, step) in self.steps.iter().enumerate() {
            let name = &reports[i].name;
            let span = step_span!(self.name, name, run_id, index = i + 1);
            let step_started = Instant::now();
            let result = step.execute(&mut ctx).instrument(span).await;

            let report = &mut reports[i];
            report.duration_ms = step_started.elapsed().as_millis() as u64;
            match result {
                Ok(()) => {
                    report.outcome = StepOutcome::Passed;
                    info!(scenario = %self.name, step = %report.name, duration_ms = report.duration_ms, "Step passed");
                }
                Err(e) => {
                    report.outcome = StepOutcome::Failed;
                    report.error = Some(e.to_string());
                    error!(scenario = %self.name, step = %report.name, error = %e, "Step failed");
                    failure = Some(ScenarioError::StepFailed {
                        scenario: self.name.clone(),
                        step: report.name.clone(),
                        index: report.index,
                        source: e,
                    });
                    break;
                }
            }
        }

        self.state =
            if failure.is_some() { ScenarioState::Failed } else { ScenarioState::Passed };
        let report = ScenarioReport {
            scenario: self.name.clone(),
            feature: self.feature.clone(),
            run_id,
            started_at,
            state: self.state,
            duration_ms: started.elapsed().as_millis() as u64,
            steps: reports,
        };
        self.report = Some(report.clone());
        info!(scenario = %self.name, %run_id, state = %self.state, duration_ms = report.duration_ms, "Scenario finished");

        match failure {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}
