//! Isolated model execution.
//!
//! Each run stages a private copy of the model artifact into a fresh scratch
//! directory, launches the prediction image in a disposable container with the
//! scratch area mounted read-only, and captures stdout as the verbatim
//! prediction text. Exactly one attempt is made per call; retry policy belongs
//! to callers.
//!
//! The runner is behind the [`ModelRunner`] trait so the facade and its tests
//! can substitute a stub for the container runtime.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::ExecutionConfig;

/// Result of a single execution attempt.
///
/// Every failure mode collapses into a variant rather than an error: a run
/// that cannot start, exits non-zero, or reports an error on stdout is a
/// failed prediction, and the caller decides what to do about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model produced output; `stdout` is the trimmed prediction text.
    Completed { stdout: String },
    /// The run failed; `detail` carries the diagnostic for the logs.
    Failed { detail: String },
    /// The configured wall-clock bound elapsed before the run finished.
    TimedOut,
}

/// Executes a model artifact against an ordered argument list.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    async fn run(&self, artifact: &Path, arguments: &[String]) -> RunOutcome;
}

/// Container-backed runner.
///
/// Invokes `docker run --rm` with the scratch directory as the only bind
/// mount (read-only), no network, and the configured memory/cpu caps. The
/// scratch directory is a [`tempfile::TempDir`], so teardown happens on every
/// exit path including timeout and panic unwinds.
pub struct DockerRunner {
    config: ExecutionConfig,
}

impl DockerRunner {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self, arguments), fields(artifact = %artifact.display(), args = arguments.len()))]
    async fn run_inner(&self, artifact: &Path, arguments: &[String]) -> RunOutcome {
        // Stage a per-invocation private copy of the artifact
        let scratch = match tempfile::Builder::new().prefix("modelctl-run-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return RunOutcome::Failed {
                    detail: format!("failed to create scratch directory: {e}"),
                };
            }
        };

        let artifact_name = match artifact.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                return RunOutcome::Failed {
                    detail: format!("artifact path has no file name: {}", artifact.display()),
                };
            }
        };

        if let Err(e) = tokio::fs::copy(artifact, scratch.path().join(&artifact_name)).await {
            return RunOutcome::Failed {
                detail: format!("failed to stage artifact into scratch area: {e}"),
            };
        }

        let container_name = format!("modelctl-run-{}", Uuid::new_v4().simple());

        let mut command = Command::new(&self.config.docker_binary);
        command
            .arg("run")
            .arg("--rm")
            .args(["--name", &container_name])
            .args(["--network", "none"]);
        if let Some(memory) = &self.config.memory_limit {
            command.args(["--memory", memory]);
        }
        if let Some(cpus) = &self.config.cpu_limit {
            command.args(["--cpus", cpus]);
        }
        command
            .args(["-v", &format!("{}:/models:ro", scratch.path().display())])
            .args(["-e", &format!("MODEL_PATH=/models/{artifact_name}")])
            .arg(&self.config.image)
            .args(&self.config.command)
            .args(arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(container = %container_name, "launching prediction container");

        let outcome = match tokio::time::timeout(self.config.timeout, command.output()).await {
            Err(_) => {
                warn!(container = %container_name, timeout = ?self.config.timeout, "prediction run exceeded wall-clock bound");
                // kill_on_drop reaps the client process; the container itself
                // is stopped by name, best-effort.
                let _ = Command::new(&self.config.docker_binary)
                    .args(["kill", &container_name])
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .output()
                    .await;
                RunOutcome::TimedOut
            }
            Ok(Err(e)) => RunOutcome::Failed {
                detail: format!("failed to start container runtime: {e}"),
            },
            Ok(Ok(output)) => classify_output(
                output.status.success(),
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            ),
        };

        // `scratch` drops here, removing the staged artifact copy
        outcome
    }
}

#[async_trait]
impl ModelRunner for DockerRunner {
    async fn run(&self, artifact: &Path, arguments: &[String]) -> RunOutcome {
        self.run_inner(artifact, arguments).await
    }
}

/// Map process output to an outcome.
///
/// The exit status is the primary signal. The literal `Error:` marker on
/// stdout is also honored for artifact scripts that report failures on stdout
/// while exiting zero.
fn classify_output(exited_ok: bool, stdout: &str, stderr: &str) -> RunOutcome {
    let stdout = stdout.trim();
    if !exited_ok {
        let detail = if stderr.trim().is_empty() { stdout } else { stderr.trim() };
        return RunOutcome::Failed {
            detail: format!("container exited with failure: {detail}"),
        };
    }
    if stdout.contains("Error:") {
        return RunOutcome::Failed {
            detail: format!("model reported an error: {stdout}"),
        };
    }
    RunOutcome::Completed {
        stdout: stdout.to_string(),
    }
}
