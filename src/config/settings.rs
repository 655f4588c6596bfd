//! # Configuration Settings
//!
//! Defines the configuration structure for the harness.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::errors::{Error, Result};

/// Main harness configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HarnessConfig {
    /// Cluster access
    #[validate(nested)]
    pub cluster: ClusterSettings,

    /// Namespace the scenario applications live in
    #[validate(length(min = 1, message = "Namespace cannot be empty"))]
    pub namespace: String,

    /// Config propagation wait
    #[validate(nested)]
    pub wait: WaitSettings,

    /// Probe calls
    #[validate(nested)]
    pub probe: ProbeSettings,

    /// Sidecar artifact capture
    #[validate(nested)]
    pub capture: CaptureSettings,

    /// Logging
    #[validate(nested)]
    pub logging: LoggingSettings,
}

impl HarnessConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        if self.wait.interval() >= self.wait.timeout() {
            return Err(Error::validation("Wait interval must be shorter than the wait timeout"));
        }

        Ok(())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            cluster: ClusterSettings::default(),
            namespace: "echo".to_string(),
            wait: WaitSettings::default(),
            probe: ProbeSettings::default(),
            capture: CaptureSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Which cluster variant backs the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusterKind {
    #[default]
    Kube,
    Fake,
}

/// Cluster access configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClusterSettings {
    /// Cluster variant
    pub kind: ClusterKind,

    /// Explicit kubeconfig path (falls back to KUBECONFIG, then ~/.kube/config)
    pub kubeconfig: Option<PathBuf>,

    /// kubectl binary
    #[validate(length(min = 1, message = "kubectl binary cannot be empty"))]
    pub kubectl: String,

    /// Hard limit for a single kubectl invocation in seconds
    #[validate(range(min = 1, max = 600, message = "Command timeout must be between 1 and 600 seconds"))]
    pub command_timeout_secs: u64,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            kind: ClusterKind::Kube,
            kubeconfig: None,
            kubectl: "kubectl".to_string(),
            command_timeout_secs: 60,
        }
    }
}

impl ClusterSettings {
    /// Resolve the kubeconfig the cluster should use
    pub fn kubeconfig_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.kubeconfig {
            return Some(path.clone());
        }

        if let Some(path) = std::env::var_os("KUBECONFIG").filter(|v| !v.is_empty()) {
            // First entry of a path list wins, like kubectl's merge order.
            return std::env::split_paths(&path).next();
        }

        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".kube").join("config"))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Wait-for-active configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WaitSettings {
    /// Deadline for config to become active in seconds
    #[validate(range(min = 1, max = 1800, message = "Wait timeout must be between 1 and 1800 seconds"))]
    pub timeout_secs: u64,

    /// Poll interval in milliseconds
    #[validate(range(min = 10, message = "Poll interval must be at least 10ms"))]
    pub interval_ms: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self { timeout_secs: 120, interval_ms: 500 }
    }
}

impl WaitSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Where probe calls originate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// From inside the source workload via the cluster
    #[default]
    Exec,
    /// From the harness process
    Direct,
}

/// Probe configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProbeSettings {
    pub mode: ProbeMode,

    /// Per-call timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Probe timeout must be between 1 and 300 seconds"))]
    pub timeout_secs: u64,

    /// Container used to issue exec probes in the source workload
    #[validate(length(min = 1, message = "Probe container cannot be empty"))]
    pub container: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self { mode: ProbeMode::Exec, timeout_secs: 10, container: "app".to_string() }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Sidecar capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CaptureSettings {
    /// Proxy container name
    #[validate(length(min = 1, message = "Proxy container cannot be empty"))]
    pub container: String,

    /// Attempts before giving up
    #[validate(range(min = 1, max = 20, message = "Capture attempts must be between 1 and 20"))]
    pub attempts: u32,

    /// Initial delay between attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self { container: "istio-proxy".to_string(), attempts: 3, retry_delay_ms: 10_000 }
    }
}

impl CaptureSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when RUST_LOG is unset
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
