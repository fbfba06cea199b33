//! Collaborators used by the wait controller
//!
//! The controller only talks to the outside world through two seams: a
//! [`Ui`] that displays messages and a [`CommandRunner`] that executes
//! command descriptors. Hosts plug in their own implementations; the local
//! ones in this module back the command-line front end.

use crate::config::RunnerSettings;
use crate::wait::command::{Command, CommandSource, ExecutorKind};
use crate::wait::error::InfrastructureError;
use async_trait::async_trait;
use std::process::Stdio;
use tracing::{debug, info};

/// Result of running one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// Whether the command reported success
    pub passed: bool,
    /// Exit code, if the process exited normally
    pub exit_code: Option<i32>,
}

impl CommandStatus {
    pub fn passed() -> Self {
        CommandStatus {
            passed: true,
            exit_code: Some(0),
        }
    }

    pub fn failed(exit_code: Option<i32>) -> Self {
        CommandStatus {
            passed: false,
            exit_code,
        }
    }

    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => CommandStatus::passed(),
            other => CommandStatus::failed(other),
        }
    }
}

/// Message sink
pub trait Ui: Send + Sync {
    /// Display a message; fire-and-forget
    fn say(&self, message: &str);
}

/// Executes command descriptors
///
/// `Ok` with `passed == false` is an ordinary negative result. `Err` means
/// the runner itself could not do its job.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &Command) -> Result<CommandStatus, InfrastructureError>;
}

/// Prints messages to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleUi;

impl Ui for ConsoleUi {
    fn say(&self, message: &str) {
        info!("{}", message);
        println!("{}", message);
    }
}

/// Runs commands as local processes
#[derive(Debug, Clone, Default)]
pub struct LocalCommandRunner {
    settings: RunnerSettings,
}

impl LocalCommandRunner {
    pub fn new(settings: RunnerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Program and arguments for a command
    pub fn command_line(
        &self,
        command: &Command,
    ) -> Result<(String, Vec<String>), InfrastructureError> {
        let interpreter = match command.executor {
            ExecutorKind::Shell => &self.settings.shell,
            ExecutorKind::Powershell => &self.settings.powershell,
        };
        let (program, mut args) = parse_interpreter(interpreter)?;

        match (&command.executor, &command.source) {
            (ExecutorKind::Shell, CommandSource::Inline(lines)) => {
                args.push("-c".to_string());
                args.push(lines.join("\n"));
            }
            (ExecutorKind::Shell, CommandSource::Script(path)) => {
                args.push(path.display().to_string());
            }
            (ExecutorKind::Powershell, source) => {
                args.extend(
                    ["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass"]
                        .iter()
                        .map(|s| s.to_string()),
                );
                match source {
                    CommandSource::Inline(lines) => {
                        args.push("-Command".to_string());
                        args.push(lines.join("\n"));
                    }
                    CommandSource::Script(path) => {
                        args.push("-File".to_string());
                        args.push(path.display().to_string());
                    }
                }
            }
        }

        Ok((program, args))
    }
}

#[async_trait]
impl CommandRunner for LocalCommandRunner {
    async fn run(&self, command: &Command) -> Result<CommandStatus, InfrastructureError> {
        let (program, args) = self.command_line(command)?;
        debug!("Running {}: {} {:?}", command, program, args);

        let mut process = tokio::process::Command::new(&program);
        process
            .args(&args)
            .envs(&command.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = &self.settings.working_dir {
            process.current_dir(dir);
        }

        let mut child = process.spawn().map_err(|source| InfrastructureError::Spawn {
            program: program.clone(),
            source,
        })?;

        let status = child
            .wait()
            .await
            .map_err(|source| InfrastructureError::Wait { program, source })?;

        debug!("{} finished with {}", command, status);
        Ok(CommandStatus::from_exit_code(status.code()))
    }
}

/// Split an interpreter setting such as `"bash -eu"` into program and args
fn parse_interpreter(interpreter: &str) -> Result<(String, Vec<String>), InfrastructureError> {
    let parts = shlex::split(interpreter).ok_or_else(|| {
        InfrastructureError::Unavailable(format!("cannot parse interpreter '{}'", interpreter))
    })?;

    let mut parts = parts.into_iter();
    let program = parts
        .next()
        .ok_or_else(|| InfrastructureError::Unavailable("empty interpreter".to_string()))?;

    Ok((program, parts.collect()))
}
