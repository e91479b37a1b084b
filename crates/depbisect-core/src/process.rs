//! Verification process orchestration.
//!
//! Runs at most one external verification process at a time and races it
//! against the operator interrupt. A killed process is a distinct outcome,
//! not an error: an interrupt alone says nothing about whether the
//! candidate works.

use std::path::PathBuf;
use std::process::ExitStatus;

use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{BisectError, Result};
use crate::interrupt::InterruptHandle;

/// One verification stage: a named shell command line.
#[derive(Debug, Clone)]
pub struct StageCommand {
    /// Human-readable stage name.
    pub name: String,

    /// Shell command line to run.
    pub command: String,
}

impl StageCommand {
    /// Create a stage.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        StageCommand {
            name: name.into(),
            command: command.into(),
        }
    }
}

/// What one orchestrated verification step observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSignal {
    /// Every process exited with status 0.
    CleanExit,

    /// Some stage exited non-zero; reported, pipeline completed anyway.
    StageFailed,

    /// The operator interrupted the running process.
    Interrupted,

    /// No process was run; manual verification mode.
    Unobserved,
}

/// How one spawned process ended.
#[derive(Debug)]
enum ProcessOutcome {
    Exited(ExitStatus),
    Killed,
}

/// Spawns and supervises verification processes.
pub struct Orchestrator {
    interrupts: InterruptHandle,
    project_dir: Option<PathBuf>,
}

impl Orchestrator {
    /// Create an orchestrator wired to the given interrupt handle.
    pub fn new(interrupts: InterruptHandle) -> Self {
        Orchestrator {
            interrupts,
            project_dir: None,
        }
    }

    /// Run verification commands in `dir` instead of the current directory.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// Single-process mode: run one long-lived command until it exits or
    /// the operator interrupts it.
    ///
    /// Exit 0 is a clean signal. A non-zero exit that was not an interrupt
    /// is an unexpected crash and aborts the search.
    pub async fn run_watched(&self, command: &str) -> Result<StepSignal> {
        info!(command = %command, "starting verification process");
        match self.run_shell(command).await? {
            ProcessOutcome::Killed => Ok(StepSignal::Interrupted),
            ProcessOutcome::Exited(status) if status.success() => Ok(StepSignal::CleanExit),
            ProcessOutcome::Exited(status) => Err(BisectError::Verification {
                command: command.to_string(),
                status: status.code().unwrap_or(-1),
            }),
        }
    }

    /// Two-stage mode: run each stage to completion, in order.
    ///
    /// A non-zero stage exit is reported and the remaining stages still
    /// run; only an operator interrupt stops the pipeline early.
    pub async fn run_stages(&self, stages: &[StageCommand]) -> Result<StepSignal> {
        let mut failed = false;

        for stage in stages {
            info!(stage = %stage.name, command = %stage.command, "starting stage");
            match self.run_shell(&stage.command).await? {
                ProcessOutcome::Killed => return Ok(StepSignal::Interrupted),
                ProcessOutcome::Exited(status) if status.success() => {}
                ProcessOutcome::Exited(status) => {
                    warn!(stage = %stage.name, %status, "stage failed");
                    failed = true;
                }
            }
        }

        if failed {
            Ok(StepSignal::StageFailed)
        } else {
            Ok(StepSignal::CleanExit)
        }
    }

    /// Spawn a shell command and await it, racing the interrupt.
    async fn run_shell(&self, command: &str) -> Result<ProcessOutcome> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(dir) = &self.project_dir {
            cmd.current_dir(dir);
        }
        let mut child = cmd.spawn()?;

        let guard = self.interrupts.arm();
        let waited = tokio::select! {
            status = child.wait() => Some(status?),
            _ = self.interrupts.cancelled() => None,
        };
        drop(guard);

        match waited {
            Some(status) => Ok(ProcessOutcome::Exited(status)),
            None => {
                // The kill may race a natural exit; wait() reaps either way.
                let _ = child.start_kill();
                child.wait().await?;
                Ok(ProcessOutcome::Killed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::InterruptAction;
    use std::time::Duration;

    fn orchestrator() -> (Orchestrator, InterruptHandle) {
        let interrupts = InterruptHandle::new();
        (Orchestrator::new(interrupts.clone()), interrupts)
    }

    #[tokio::test]
    async fn test_run_watched_clean_exit() {
        let (orch, _interrupts) = orchestrator();
        let signal = orch.run_watched("true").await.expect("run failed");
        assert_eq!(signal, StepSignal::CleanExit);
    }

    #[tokio::test]
    async fn test_run_watched_crash_is_fatal() {
        let (orch, _interrupts) = orchestrator();
        let err = orch.run_watched("exit 3").await.unwrap_err();
        match err {
            BisectError::Verification { status, .. } => assert_eq!(status, 3),
            other => panic!("expected Verification error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_watched_interrupt_reports_killed() {
        let (orch, interrupts) = orchestrator();

        let task = tokio::spawn(async move { orch.run_watched("sleep 5").await });
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(interrupts.deliver(), InterruptAction::CancelPending);

        let signal = task.await.unwrap().expect("run failed");
        assert_eq!(signal, StepSignal::Interrupted);
    }

    #[tokio::test]
    async fn test_run_stages_all_clean() {
        let (orch, _interrupts) = orchestrator();
        let stages = [
            StageCommand::new("build", "true"),
            StageCommand::new("start", "true"),
        ];
        let signal = orch.run_stages(&stages).await.expect("run failed");
        assert_eq!(signal, StepSignal::CleanExit);
    }

    #[tokio::test]
    async fn test_run_stages_failure_does_not_abort_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let interrupts = InterruptHandle::new();
        let orch = Orchestrator::new(interrupts).with_project_dir(dir.path());

        // The failing build stage must not stop the start stage from
        // running and leaving its marker.
        let stages = [
            StageCommand::new("build", "false"),
            StageCommand::new("start", "touch started"),
        ];
        let signal = orch.run_stages(&stages).await.expect("run failed");

        assert_eq!(signal, StepSignal::StageFailed);
        assert!(dir.path().join("started").exists());
    }

    #[tokio::test]
    async fn test_run_stages_interrupt_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let interrupts = InterruptHandle::new();
        let orch = Orchestrator::new(interrupts.clone()).with_project_dir(dir.path());
        let marker = dir.path().join("started");

        let task = tokio::spawn(async move {
            let stages = [
                StageCommand::new("build", "sleep 5"),
                StageCommand::new("start", "touch started"),
            ];
            orch.run_stages(&stages).await
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(interrupts.deliver(), InterruptAction::CancelPending);

        let signal = task.await.unwrap().expect("run failed");
        assert_eq!(signal, StepSignal::Interrupted);
        assert!(!marker.exists(), "later stages must not run after interrupt");
    }
}
