//! External command execution.
//!
//! Every invocation names its working directory explicitly; nothing here
//! changes the process-wide current directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// One external command to run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Short label used for logs, e.g. the pipeline stage
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(
        label: impl Into<String>,
        program: impl Into<String>,
        cwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Completion status of a command that ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    pub success: bool,
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

impl CommandStatus {
    pub fn success() -> Self {
        Self {
            success: true,
            code: Some(0),
        }
    }

    pub fn failed(code: i32) -> Self {
        Self {
            success: false,
            code: Some(code),
        }
    }
}

/// Runs external commands synchronously from the caller's point of view.
///
/// `Ok` with a non-success status is a stage failure; `Err` is a fault
/// (missing binary, I/O error, unexpected termination).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> AppResult<CommandStatus>;
}

/// Runs commands as child processes.
///
/// With a log directory, stdout and stderr of each invocation are appended
/// to `<log_dir>/<label>.log`; otherwise they are inherited.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    log_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: Some(log_dir.into()),
        }
    }

    /// Open `<dir>/<label>.log` for appending, headed by the command line.
    /// Returns one handle for stdout and one for stderr.
    async fn open_log(
        &self,
        dir: &Path,
        invocation: &Invocation,
    ) -> AppResult<(std::fs::File, std::fs::File)> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::fs(dir, e))?;
        let path = dir.join(format!("{}.log", invocation.label));
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| AppError::fs(&path, e))?;
        let header = format!("$ {}\n", invocation.command_line());
        file.write_all(header.as_bytes())
            .await
            .map_err(|e| AppError::fs(&path, e))?;
        file.flush().await.map_err(|e| AppError::fs(&path, e))?;

        let stdout = file.into_std().await;
        let stderr = stdout.try_clone().map_err(|e| AppError::fs(&path, e))?;
        Ok((stdout, stderr))
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> AppResult<CommandStatus> {
        info!(
            "[{}] running '{}' in {}",
            invocation.label,
            invocation.command_line(),
            invocation.cwd.display()
        );

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).current_dir(&invocation.cwd);

        if let Some(dir) = &self.log_dir {
            command.stdin(Stdio::null());
            match self.open_log(dir, invocation).await {
                Ok((stdout, stderr)) => {
                    command.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
                }
                Err(e) => warn!(
                    "[{}] could not open command log, output goes to the console: {}",
                    invocation.label, e
                ),
            }
        }

        let status = command
            .status()
            .await
            .map_err(|source| AppError::CommandFault {
                program: invocation.program.clone(),
                source,
            })?;

        let result = CommandStatus {
            success: status.success(),
            code: status.code(),
        };
        debug!("[{}] finished with {:?}", invocation.label, result);
        Ok(result)
    }
}
