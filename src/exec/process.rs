// src/exec/process.rs

//! Runs one external program with its output appended to the task log.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::fs::OpenOptions;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::{ProcessError, StageError};
use crate::exec::cancel::StageCancel;
use crate::exec::group::{self, ProcessGroup};
use crate::strategy::StageCommand;

/// Process runner scoped to one task's log file.
///
/// Every run appends stdout and stderr of the child to the same file, so the
/// log reads as one chronological record of the task.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    log_file: PathBuf,
}

impl ProcessRunner {
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
        }
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub async fn run_command(
        &self,
        command: &StageCommand,
        cancel: &mut StageCancel,
    ) -> Result<(), StageError> {
        self.run(&command.program, &command.args, command.cwd.as_deref(), cancel)
            .await
    }

    /// Run `program` to completion.
    ///
    /// - Non-zero exit → [`StageError::ToolFailed`].
    /// - Cancellation → the child's whole process group is killed, the child
    ///   is reaped, then [`StageError::Cancelled`] is returned.
    /// - If this future is dropped mid-run the process group is killed as
    ///   well.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        cancel: &mut StageCancel,
    ) -> Result<(), StageError> {
        let (stdout, stderr) = self.open_log().await?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);
        group::isolate(&mut cmd);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let command_line = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        info!(command = %command_line, cwd = ?cwd, log = ?self.log_file, "executing");

        let mut child = cmd.spawn().map_err(|source| StageError::Spawn {
            program: program.to_string(),
            source,
        })?;
        let pid = child.id();
        let mut group = ProcessGroup::led_by(pid);

        tokio::select! {
            status_res = child.wait() => {
                let status = status_res.map_err(|source| StageError::Io {
                    context: "waiting for process writing to",
                    path: self.log_file.clone(),
                    source,
                })?;
                group.disarm();

                debug!(
                    command = %command_line,
                    pid = ?pid,
                    exit_code = ?status.code(),
                    success = status.success(),
                    "process exited"
                );

                if status.success() {
                    Ok(())
                } else {
                    Err(StageError::ToolFailed(ProcessError {
                        program: program.to_string(),
                        args: args.to_vec(),
                        code: status.code(),
                    }))
                }
            }

            _ = cancel.cancelled() => {
                warn!(command = %command_line, pid = ?pid, "cancellation requested; killing process group");
                if let Err(e) = group.kill() {
                    warn!(command = %command_line, pid = ?pid, error = %e, "failed to kill process group");
                }
                // Reap the leader; `kill` falls back to signalling it directly.
                if let Err(e) = child.kill().await {
                    warn!(command = %command_line, pid = ?pid, error = %e, "failed to reap process");
                }
                Err(StageError::Cancelled)
            }
        }
    }

    async fn open_log(&self) -> Result<(Stdio, Stdio), StageError> {
        if let Some(parent) = self.log_file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StageError::Io {
                    context: "creating log directory",
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let io_err = |source: std::io::Error| StageError::Io {
            context: "opening log file",
            path: self.log_file.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .await
            .map_err(io_err)?
            .into_std()
            .await;
        let err_file = file.try_clone().map_err(io_err)?;

        Ok((Stdio::from(file), Stdio::from(err_file)))
    }
}
