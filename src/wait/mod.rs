//! Condition-gated wait step
//!
//! A wait suspends a provisioning pipeline until a fixed duration elapses or
//! a readiness check says the machine is ready, then runs an optional
//! success or failure action.
//!
//! Typical use from a host:
//!
//! 1. [`WaitProvisioner::prepare`] validates the raw configuration up front.
//! 2. [`WaitProvisioner::provision`] runs the wait with the host's [`Ui`] and
//!    [`CommandRunner`].
//! 3. [`WaitProvisioner::cancel`] may be called from elsewhere at any time to
//!    stop the wait early.

use tokio_util::sync::CancellationToken;

pub use command::{Command, CommandSource, ExecutorKind};
pub use controller::{execute, Outcome, Resolution};
pub use duration::{DurationParseError, WaitDuration};
pub use error::{
    ActionDispatchError, ActionKind, ConfigError, ConfigErrors, InfrastructureError, WaitError,
};
pub use runner::{CommandRunner, CommandStatus, ConsoleUi, LocalCommandRunner, Ui};
pub use spec::{WaitMode, WaitSpec, DEFAULT_SLEEP, UNBOUNDED_TRIES};

pub mod command;
pub mod controller;
pub mod duration;
pub mod error;
pub mod runner;
pub mod spec;


/// A prepared wait step together with its cancellation handle
#[derive(Debug, Clone)]
pub struct WaitProvisioner {
    spec: WaitSpec,
    cancel: CancellationToken,
}

impl WaitProvisioner {
    /// Validate raw configuration; fails before any waiting begins
    pub fn prepare(raw: serde_yaml::Value) -> Result<Self, ConfigErrors> {
        Ok(Self::new(WaitSpec::from_value(raw)?))
    }

    pub fn new(spec: WaitSpec) -> Self {
        Self {
            spec,
            cancel: CancellationToken::new(),
        }
    }

    pub fn spec(&self) -> &WaitSpec {
        &self.spec
    }

    /// Handle that cancels this wait when triggered
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask the running wait to stop
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn provision(
        &self,
        ui: &dyn Ui,
        runner: &dyn CommandRunner,
    ) -> Result<Outcome, WaitError> {
        execute(&self.spec, ui, runner, &self.cancel).await
    }
}
