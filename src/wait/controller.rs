//! Wait controller
//!
//! Drives exactly one wait: shows the configured message, runs the fixed
//! sleep or the polling loop, then dispatches the matching outcome action.
//!
//! The polling loop moves through `Checking → Sleeping → Checking ...` until
//! it reaches one of the terminal resolutions `Succeeded`, `Exhausted` or
//! `Canceled`. Cancellation is cooperative: it is observed before every check
//! and while sleeping, but a check that is already running is allowed to
//! finish.

use crate::wait::command::Command;
use crate::wait::duration::WaitDuration;
use crate::wait::error::{ActionDispatchError, ActionKind, WaitError};
use crate::wait::runner::{CommandRunner, Ui};
use crate::wait::spec::{WaitMode, WaitSpec};
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The duration elapsed or the condition was met
    Succeeded,
    /// Every allowed check ran without meeting the condition
    Exhausted,
    /// The caller canceled the wait
    Canceled,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Succeeded => f.write_str("succeeded"),
            Resolution::Exhausted => f.write_str("exhausted"),
            Resolution::Canceled => f.write_str("canceled"),
        }
    }
}

/// Terminal result of one wait execution
#[derive(Debug)]
pub struct Outcome {
    pub resolution: Resolution,
    /// Number of checks that ran (always zero for fixed waits)
    pub attempts: u32,
    pub elapsed: Duration,
    /// Exit code of the most recent check
    pub last_exit_code: Option<i32>,
    /// Failures of `on_success` / `on_failure`, reported as warnings
    pub action_errors: Vec<ActionDispatchError>,
}

impl Outcome {
    pub fn is_succeeded(&self) -> bool {
        self.resolution == Resolution::Succeeded
    }

    pub fn has_warnings(&self) -> bool {
        !self.action_errors.is_empty()
    }
}

struct Progress {
    resolution: Resolution,
    attempts: u32,
    last_exit_code: Option<i32>,
}

impl Progress {
    fn new(resolution: Resolution, attempts: u32, last_exit_code: Option<i32>) -> Self {
        Progress {
            resolution,
            attempts,
            last_exit_code,
        }
    }
}

/// Execute a validated wait
///
/// Returns `Err` only when the command runner fails while running a check;
/// in that case no outcome action is dispatched.
pub async fn execute(
    spec: &WaitSpec,
    ui: &dyn Ui,
    runner: &dyn CommandRunner,
    cancel: &CancellationToken,
) -> Result<Outcome, WaitError> {
    let started = Instant::now();
    info!("Starting wait: {}", spec);

    if let Some(message) = spec.message() {
        ui.say(message);
    }

    let progress = match spec.mode() {
        WaitMode::Fixed(duration) => wait_fixed(*duration, cancel).await,
        WaitMode::Until(check) => poll(spec, check, true, runner, cancel).await?,
        WaitMode::While(check) => poll(spec, check, false, runner, cancel).await?,
    };

    info!(
        "Wait {} after {} check(s) in {:?}",
        progress.resolution,
        progress.attempts,
        started.elapsed()
    );

    let mut action_errors = Vec::new();
    let action = match progress.resolution {
        Resolution::Succeeded => spec.on_success().map(|c| (ActionKind::OnSuccess, c)),
        Resolution::Exhausted => spec.on_failure().map(|c| (ActionKind::OnFailure, c)),
        Resolution::Canceled => None,
    };
    if let Some((kind, command)) = action {
        if let Err(e) = dispatch(kind, command, runner).await {
            warn!("{}", e);
            action_errors.push(e);
        }
    }

    Ok(Outcome {
        resolution: progress.resolution,
        attempts: progress.attempts,
        elapsed: started.elapsed(),
        last_exit_code: progress.last_exit_code,
        action_errors,
    })
}

async fn wait_fixed(duration: WaitDuration, cancel: &CancellationToken) -> Progress {
    if cancel.is_cancelled() {
        return Progress::new(Resolution::Canceled, 0, None);
    }

    debug!("Sleeping for {}", duration);
    if sleep_unless_canceled(duration.as_duration(), cancel).await {
        Progress::new(Resolution::Succeeded, 0, None)
    } else {
        Progress::new(Resolution::Canceled, 0, None)
    }
}

/// Poll `check` until it reports `ready_when`
///
/// `until` waits are ready once the check passes, `while` waits once it
/// fails.
async fn poll(
    spec: &WaitSpec,
    check: &Command,
    ready_when: bool,
    runner: &dyn CommandRunner,
    cancel: &CancellationToken,
) -> Result<Progress, WaitError> {
    let max_tries = spec.max_tries();
    let mut attempts: u32 = 0;
    let mut last_exit_code = None;

    loop {
        if cancel.is_cancelled() {
            return Ok(Progress::new(Resolution::Canceled, attempts, last_exit_code));
        }

        attempts += 1;
        let status = runner
            .run(check)
            .await
            .map_err(|source| WaitError::Infrastructure { attempts, source })?;
        last_exit_code = status.exit_code;

        if status.passed == ready_when {
            return Ok(Progress::new(Resolution::Succeeded, attempts, last_exit_code));
        }

        if attempts >= max_tries {
            return Ok(Progress::new(Resolution::Exhausted, attempts, last_exit_code));
        }

        debug!(
            "Check {} not ready (exit code {:?}), retrying in {}",
            attempts,
            status.exit_code,
            spec.sleep()
        );

        if !sleep_unless_canceled(spec.sleep().as_duration(), cancel).await {
            return Ok(Progress::new(Resolution::Canceled, attempts, last_exit_code));
        }
    }
}

/// Sleep for `duration`; returns `false` if cancellation cut it short
async fn sleep_unless_canceled(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

async fn dispatch(
    kind: ActionKind,
    command: &Command,
    runner: &dyn CommandRunner,
) -> Result<(), ActionDispatchError> {
    info!("Running {} action: {}", kind, command);
    match runner.run(command).await {
        Ok(status) if status.passed => Ok(()),
        Ok(status) => Err(ActionDispatchError::Failed {
            action: kind,
            exit_code: status.exit_code,
        }),
        Err(source) => Err(ActionDispatchError::Runner {
            action: kind,
            source,
        }),
    }
}
