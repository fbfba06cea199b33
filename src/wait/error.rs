//! Error types for wait configuration and execution

use std::fmt;
use thiserror::Error;

/// A single problem found while validating a wait configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("configuration must be a mapping of keys to values")]
    NotAMapping,

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("one of 'duration', 'until' or 'while' must be set")]
    MissingMode,

    #[error("only one of 'duration', 'until' or 'while' may be set, found: {}", .0.join(", "))]
    ConflictingModes(Vec<&'static str>),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl fmt::Display) -> Self {
        ConfigError::InvalidField {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

/// Every problem found in one configuration, reported together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigErrors(Vec<ConfigError>);

impl ConfigErrors {
    pub(crate) fn new(errors: Vec<ConfigError>) -> Self {
        ConfigErrors(errors)
    }

    pub fn errors(&self) -> &[ConfigError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigError> {
        self.0.iter()
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() == 1 {
            return write!(f, "invalid wait configuration: {}", self.0[0]);
        }
        write!(f, "{} errors in wait configuration:", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  * {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrors {}

/// The command runner itself could not execute a command
#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command runner unavailable: {0}")]
    Unavailable(String),
}

/// Which outcome action failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    OnSuccess,
    OnFailure,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::OnSuccess => f.write_str("on_success"),
            ActionKind::OnFailure => f.write_str("on_failure"),
        }
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// An `on_success` / `on_failure` action did not complete cleanly
///
/// Attached to an [`Outcome`](crate::wait::Outcome) as a warning; it never
/// changes the resolution of the wait.
#[derive(Debug, Error)]
pub enum ActionDispatchError {
    #[error("{action} action exited with code {}", exit_code_label(.exit_code))]
    Failed {
        action: ActionKind,
        exit_code: Option<i32>,
    },

    #[error("{action} action could not be run: {source}")]
    Runner {
        action: ActionKind,
        #[source]
        source: InfrastructureError,
    },
}

impl ActionDispatchError {
    pub fn action(&self) -> ActionKind {
        match self {
            ActionDispatchError::Failed { action, .. } => *action,
            ActionDispatchError::Runner { action, .. } => *action,
        }
    }
}

/// Fatal errors from a wait execution
///
/// Configuration problems are reported earlier, by validation, as
/// [`ConfigErrors`].
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("check aborted after {attempts} attempt(s): {source}")]
    Infrastructure {
        attempts: u32,
        #[source]
        source: InfrastructureError,
    },
}
