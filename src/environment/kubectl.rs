//! Bounded `kubectl` invocations against an explicit kubeconfig.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, Instrument};

use crate::kubectl_span;

/// Failure of a single kubectl invocation
#[derive(thiserror::Error, Debug)]
pub enum KubectlError {
    #[error("failed to run '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("'{command}' exited with {code:?}: {stderr}")]
    Failed { command: String, code: Option<i32>, stderr: String },
}

impl KubectlError {
    /// The API server answered that the object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubectlError::Failed { stderr, .. }
            if stderr.contains("NotFound") || stderr.contains("not found"))
    }

    /// Short reason suitable for error reports
    pub fn reason(&self) -> String {
        match self {
            KubectlError::Failed { stderr, .. } if !stderr.trim().is_empty() => {
                stderr.trim().to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Captured output of a successful invocation
#[derive(Debug, Clone, Default)]
pub struct KubectlOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl KubectlOutput {
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }
}

/// kubectl runner bound to one kubeconfig
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: String,
    kubeconfig: PathBuf,
    timeout: Duration,
}

struct CommandLine<'a>(&'a str, &'a [&'a str]);

impl fmt::Display for CommandLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.1.join(" "))
    }
}

impl Kubectl {
    pub fn new(binary: impl Into<String>, kubeconfig: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { binary: binary.into(), kubeconfig: kubeconfig.into(), timeout }
    }

    pub fn kubeconfig(&self) -> &Path {
        &self.kubeconfig
    }

    /// Same runner, different credential
    pub fn with_kubeconfig(&self, kubeconfig: &Path) -> Self {
        Self { kubeconfig: kubeconfig.to_path_buf(), ..self.clone() }
    }

    /// Run `kubectl --kubeconfig <path> <args>`, optionally feeding `stdin`.
    ///
    /// The child is killed if the timeout elapses.
    pub async fn run(
        &self,
        namespace: &str,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<KubectlOutput, KubectlError> {
        let verb = args.first().copied().unwrap_or_default();
        self.run_inner(args, stdin).instrument(kubectl_span!(verb, namespace)).await
    }

    async fn run_inner(
        &self,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<KubectlOutput, KubectlError> {
        let command = CommandLine(&self.binary, args).to_string();
        debug!(%command, "Running kubectl");

        let mut child = Command::new(&self.binary)
            .arg("--kubeconfig")
            .arg(&self.kubeconfig)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| KubectlError::Spawn { binary: self.binary.clone(), source })?;

        let io = async {
            if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
                pipe.write_all(input).await?;
                // Close stdin so `-f -` sees EOF.
                drop(pipe);
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(self.timeout, io).await {
            Ok(result) => result
                .map_err(|source| KubectlError::Spawn { binary: self.binary.clone(), source })?,
            Err(_) => return Err(KubectlError::Timeout { command, timeout: self.timeout }),
        };

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            debug!(%command, code = ?output.status.code(), %stderr, "kubectl failed");
            return Err(KubectlError::Failed { command, code: output.status.code(), stderr });
        }

        Ok(KubectlOutput { stdout: output.stdout, stderr })
    }
}
