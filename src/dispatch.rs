//! Turning logical operations into process invocations.
//!
//! An `Operation` is either a shell command or a two-path copy. Combined
//! with the configured `Transport`, it yields exactly one `Invocation`
//! (executable plus argv), which a `Runner` then executes.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use tokio::process::Command;

use crate::config::{Transport, TransportConfig};
use crate::error::LavaError;

/// Host-key checking is disabled for every SSH/SCP hop.
const SSH_OPTIONS: [&str; 2] = ["-o", "StrictHostKeyChecking=no"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local source, remote destination.
    Send,
    /// Remote source, local destination.
    Retrieve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    /// Split on whitespace. Arguments containing spaces cannot be expressed.
    Shell(&'a str),
    Copy {
        source: &'a str,
        destination: &'a str,
        direction: Direction,
    },
}

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Pure: the same operation and config always produce the same invocation.
    pub fn build(operation: Operation<'_>, config: &TransportConfig) -> Self {
        let exec = &config.executables;
        match (operation, &config.transport) {
            (Operation::Shell(command), Transport::Ssh(target)) => {
                let mut args = vec![target.user_host()];
                args.extend(ssh_options(&target.identity_file));
                args.extend(split_command(command));
                Self::new(&exec.ssh, args)
            }
            (Operation::Shell(command), Transport::Local) => {
                Self::new(&exec.local_shell, split_command(command).collect())
            }
            (
                Operation::Copy {
                    source,
                    destination,
                    ..
                },
                _,
            ) if config.use_shared_dir => {
                Self::new(&exec.local_copy, vec![source.into(), destination.into()])
            }
            (
                Operation::Copy {
                    source,
                    destination,
                    direction,
                },
                Transport::Ssh(target),
            ) => {
                let (source, destination) = match direction {
                    Direction::Send => (
                        source.to_string(),
                        format!("{}:{}", target.user_host(), destination),
                    ),
                    Direction::Retrieve => (
                        format!("{}:{}", target.user_host(), source),
                        destination.to_string(),
                    ),
                };
                let mut args = ssh_options(&target.identity_file);
                args.push(source);
                args.push(destination);
                Self::new(&exec.scp, args)
            }
            (
                Operation::Copy {
                    source,
                    destination,
                    ..
                },
                Transport::Local,
            ) => Self::new(&exec.local_copy, vec![source.into(), destination.into()]),
        }
    }

    fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.program)
        } else {
            write!(f, "{} {}", self.program, self.args.iter().join(" "))
        }
    }
}

fn ssh_options(identity_file: &str) -> Vec<String> {
    let mut options: Vec<String> = SSH_OPTIONS.iter().map(|s| s.to_string()).collect();
    options.push("-i".to_string());
    options.push(identity_file.to_string());
    options
}

fn split_command(command: &str) -> impl Iterator<Item = String> + '_ {
    command.split_whitespace().map(String::from)
}

/// What a finished process left behind. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_status: Option<i32>,
}

impl ExecutionResult {
    /// Any stderr output counts as failure, whatever the exit status says.
    pub fn into_stdout(self) -> Result<String, LavaError> {
        if self.stderr.is_empty() {
            Ok(self.stdout)
        } else {
            Err(LavaError::Transport(self.stderr))
        }
    }
}

/// Executes an invocation to completion.
#[async_trait]
pub trait Runner {
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionResult, LavaError>;
}

/// Spawns a real child process per invocation.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The child is killed once `timeout` elapses.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionResult, LavaError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = command.spawn().map_err(|source| LavaError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;
        let output = match self.timeout {
            Some(after) => tokio::time::timeout(after, child.wait_with_output())
                .await
                .map_err(|_| LavaError::Timeout {
                    program: invocation.program.clone(),
                    after,
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| LavaError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;
        Ok(ExecutionResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_status: output.status.code(),
        })
    }
}

/// Binds a transport configuration to a runner.
pub struct Dispatcher<R = ProcessRunner> {
    config: TransportConfig,
    runner: R,
}

impl Dispatcher<ProcessRunner> {
    pub fn new(config: TransportConfig) -> Self {
        Self::with_runner(config, ProcessRunner::new())
    }
}

impl<R: Runner + Sync> Dispatcher<R> {
    pub fn with_runner(config: TransportConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Runs exactly one external process and waits for it to exit.
    pub async fn dispatch(&self, operation: Operation<'_>) -> Result<ExecutionResult, LavaError> {
        let invocation = Invocation::build(operation, &self.config);
        tracing::debug!(program = %invocation.program, args = ?invocation.args, "dispatching");
        let result = self.runner.run(&invocation).await?;
        if !result.stderr.is_empty() {
            tracing::warn!(
                command = %invocation,
                exit_status = ?result.exit_status,
                stderr = %result.stderr.trim_end(),
                "command wrote to stderr"
            );
        }
        Ok(result)
    }
}
