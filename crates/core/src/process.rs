//! Runs external tools (git, npm, forge, cloc) with captured output and a hard timeout.

use std::{
    fmt,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Added on top of the inherited environment, for this child only.
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.as_ref().to_path_buf(),
            env: Vec::new(),
            timeout,
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool { self.status.success() }
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` timed out after {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
    #[error("`{command}` exited with {status}: {}", stderr.trim())]
    Failed { command: String, status: ExitStatus, stdout: String, stderr: String },
}

impl CommandError {
    /// Captured stderr, when the process ran to completion.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Failed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Run to completion and capture output, whatever the exit status.
pub async fn run(spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .kill_on_drop(true);
    tracing::debug!(cwd = %spec.cwd.display(), "Running {spec}");
    let output = match tokio::time::timeout(spec.timeout, command.output()).await {
        Ok(result) => result
            .map_err(|source| CommandError::Spawn { program: spec.program.clone(), source })?,
        Err(_) => {
            return Err(CommandError::Timeout { command: spec.to_string(), timeout: spec.timeout });
        }
    };
    Ok(CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Like [`run`], but a non-zero exit status is an error.
pub async fn run_checked(spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
    let output = run(spec).await?;
    if !output.success() {
        return Err(CommandError::Failed {
            command: spec.to_string(),
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }
    Ok(output)
}
