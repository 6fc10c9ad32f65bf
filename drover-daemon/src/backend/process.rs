//! Local process backend
//!
//! Materializes the rendered script into a temporary file and executes it
//! with the configured interpreter as a child process, capturing stdout and
//! stderr. The script file lives until the child exits.

use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{BackendError, ExecutionBackend, LaunchSpec, RunHandle, RunOutcome};

/// Backend that runs scripts as local subprocesses
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    interpreter: String,
    work_dir: PathBuf,
}

impl ProcessBackend {
    pub fn new(interpreter: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl ExecutionBackend for ProcessBackend {
    async fn submit(&self, spec: LaunchSpec) -> Result<Box<dyn RunHandle>, BackendError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;

        let mut file = tempfile::Builder::new()
            .prefix(&format!("run-{}-", spec.run_id))
            .suffix(".script")
            .tempfile_in(&self.work_dir)?;
        file.write_all(spec.script.as_bytes())?;
        file.flush()?;

        debug!(
            "Materialized script for run {} at {}",
            spec.run_id,
            file.path().display()
        );

        let child = Command::new(&self.interpreter)
            .arg(file.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let state: Arc<Mutex<Option<RunOutcome>>> = Arc::new(Mutex::new(None));
        let task_state = Arc::clone(&state);
        let run_id = spec.run_id;

        tokio::spawn(async move {
            // Keeps the script file on disk until the child exits
            let _file = file;

            let outcome = match child.wait_with_output().await {
                Ok(output) => {
                    let exit_code = output.status.code();
                    let success = output.status.success();
                    RunOutcome {
                        success,
                        exit_code,
                        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                        message: if success {
                            None
                        } else {
                            Some(format!("script exited with code {:?}", exit_code))
                        },
                    }
                }
                Err(e) => {
                    warn!("Failed to wait for run {} subprocess: {}", run_id, e);
                    RunOutcome {
                        success: false,
                        exit_code: None,
                        stdout: String::new(),
                        stderr: String::new(),
                        message: Some(format!("failed to wait for subprocess: {}", e)),
                    }
                }
            };

            *task_state.lock().await = Some(outcome);
        });

        Ok(Box::new(ProcessHandle { state }))
    }
}

/// Handle over a spawned subprocess
struct ProcessHandle {
    state: Arc<Mutex<Option<RunOutcome>>>,
}

#[async_trait]
impl RunHandle for ProcessHandle {
    async fn is_finished(&self) -> Result<bool, BackendError> {
        Ok(self.state.lock().await.is_some())
    }

    async fn is_failed(&self) -> Result<bool, BackendError> {
        Ok(matches!(&*self.state.lock().await, Some(o) if !o.success))
    }

    async fn is_successful(&self) -> Result<bool, BackendError> {
        Ok(matches!(&*self.state.lock().await, Some(o) if o.success))
    }

    async fn outcome(&self) -> Result<RunOutcome, BackendError> {
        self.state
            .lock()
            .await
            .clone()
            .ok_or(BackendError::NotFinished)
    }
}
