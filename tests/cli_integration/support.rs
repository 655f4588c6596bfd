//! Support utilities for CLI integration tests

use std::path::PathBuf;

/// Result of a CLI invocation
#[derive(Debug)]
pub struct CliOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

fn cli_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_meshverify"))
}

/// Run the CLI with extra environment variables.
///
/// Settings default to the in-memory cluster with short waits so no kubeconfig
/// is needed.
pub async fn run_cli_command_with_env(args: &[&str], env_overrides: &[(&str, &str)]) -> CliOutput {
    run_cli_command_with_env_removed(args, env_overrides, &[]).await
}

/// Like [`run_cli_command_with_env`], with `removed` unset in the child
pub async fn run_cli_command_with_env_removed(
    args: &[&str],
    env_overrides: &[(&str, &str)],
    removed: &[&str],
) -> CliOutput {
    use std::process::Command;

    let args_owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let removed_owned: Vec<String> = removed.iter().map(|s| s.to_string()).collect();
    let mut env_owned: Vec<(String, String)> = vec![
        ("MESHVERIFY_CLUSTER__KIND".into(), "fake".into()),
        ("MESHVERIFY_WAIT__INTERVAL_MS".into(), "20".into()),
        ("MESHVERIFY_CAPTURE__RETRY_DELAY_MS".into(), "10".into()),
        ("RUST_LOG".into(), "warn".into()),
    ];
    env_owned.extend(env_overrides.iter().map(|(k, v)| (k.to_string(), v.to_string())));

    tokio::task::spawn_blocking(move || {
        let mut cmd = Command::new(cli_binary_path());
        cmd.args(&args_owned).env_remove("MESHVERIFY_CONFIG");
        for key in removed_owned {
            cmd.env_remove(key);
        }
        for (key, value) in env_owned {
            cmd.env(key, value);
        }

        let output = cmd.output().expect("failed to execute CLI command");
        CliOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    })
    .await
    .expect("CLI task panicked")
}

pub async fn run_cli_command(args: &[&str]) -> CliOutput {
    run_cli_command_with_env(args, &[]).await
}

/// Temporary directory holding files handed to the CLI
pub struct TempWorkspace {
    dir: tempfile::TempDir,
}

impl TempWorkspace {
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().expect("create temp dir") }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("write temp file");
        path
    }
}
