//! Wait configuration and validation
//!
//! A [`WaitSpec`] is built once per provisioning step from raw configuration.
//! Validation is eager and collects every problem it finds, so a broken
//! configuration is reported in full before any waiting begins.
//!
//! # Examples
//!
//! ## Fixed pause
//!
//! **YAML Format:**
//! ```yaml
//! duration: 20s
//! message: "Waiting for 20 seconds"
//! ```
//!
//! ## Poll until ready
//!
//! **JSON Format:**
//! ```json
//! {
//!   "until": { "type": "powershell", "inline": ["if ($ready) { exit 0 } else { exit 1 }"] },
//!   "sleep": "1m",
//!   "tries": 60,
//!   "on_success": { "type": "powershell", "inline": "Write-Output 'Software is installed!'" },
//!   "on_failure": { "type": "powershell", "script": "./scripts/Backup-Logs.ps1" }
//! }
//! ```
//!
//! ## Poll while busy
//!
//! **TOML Format:**
//! ```toml
//! sleep = "5s"
//! tries = 12
//!
//! [while]
//! type = "shell"
//! inline = ["pgrep -x apt-get"]
//! ```

use crate::wait::command::Command;
use crate::wait::duration::{DurationParseError, WaitDuration};
use crate::wait::error::{ConfigError, ConfigErrors};
use serde_yaml::Value;
use std::fmt;
use tracing::{debug, warn};

/// Delay between checks when `sleep` is unset, zero or negative
pub const DEFAULT_SLEEP: WaitDuration = WaitDuration::from_secs(1);

/// Stand-in for "no limit" on check attempts
pub const UNBOUNDED_TRIES: u32 = u32::MAX;

/// Wait strategy and its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitMode {
    /// Sleep for a fixed span
    Fixed(WaitDuration),
    /// Poll the check until it succeeds
    Until(Command),
    /// Poll the check while it keeps succeeding
    While(Command),
}

impl WaitMode {
    pub fn name(&self) -> &'static str {
        match self {
            WaitMode::Fixed(_) => "duration",
            WaitMode::Until(_) => "until",
            WaitMode::While(_) => "while",
        }
    }

    /// The readiness check, `None` for fixed waits
    pub fn check(&self) -> Option<&Command> {
        match self {
            WaitMode::Fixed(_) => None,
            WaitMode::Until(check) | WaitMode::While(check) => Some(check),
        }
    }
}

/// A validated, immutable wait configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSpec {
    mode: WaitMode,
    sleep: WaitDuration,
    max_tries: u32,
    on_success: Option<Command>,
    on_failure: Option<Command>,
    message: Option<String>,
}

impl WaitSpec {
    pub fn fixed(duration: WaitDuration) -> Self {
        Self::with_mode(WaitMode::Fixed(duration))
    }

    pub fn until(check: Command) -> Self {
        Self::with_mode(WaitMode::Until(check))
    }

    pub fn while_(check: Command) -> Self {
        Self::with_mode(WaitMode::While(check))
    }

    fn with_mode(mode: WaitMode) -> Self {
        WaitSpec {
            mode,
            sleep: DEFAULT_SLEEP,
            max_tries: UNBOUNDED_TRIES,
            on_success: None,
            on_failure: None,
            message: None,
        }
    }

    /// Set the delay between checks; zero falls back to [`DEFAULT_SLEEP`]
    pub fn with_sleep(mut self, sleep: WaitDuration) -> Self {
        self.sleep = normalize_sleep(sleep);
        self
    }

    /// Cap the number of checks; zero means unbounded
    pub fn with_max_tries(mut self, tries: u32) -> Self {
        self.max_tries = normalize_tries(tries);
        self
    }

    pub fn with_on_success(mut self, action: Command) -> Self {
        self.on_success = Some(action);
        self
    }

    pub fn with_on_failure(mut self, action: Command) -> Self {
        self.on_failure = Some(action);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.message = (!message.is_empty()).then_some(message);
        self
    }

    pub fn mode(&self) -> &WaitMode {
        &self.mode
    }

    pub fn sleep(&self) -> WaitDuration {
        self.sleep
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_tries == UNBOUNDED_TRIES
    }

    pub fn on_success(&self) -> Option<&Command> {
        self.on_success.as_ref()
    }

    pub fn on_failure(&self) -> Option<&Command> {
        self.on_failure.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Validate a raw configuration mapping
    ///
    /// Unknown keys, malformed values and mode conflicts are all collected
    /// into one [`ConfigErrors`]; no spec is produced unless every field is
    /// valid.
    pub fn from_value(value: Value) -> Result<Self, ConfigErrors> {
        let mapping = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => serde_yaml::Mapping::new(),
            _ => return Err(ConfigErrors::new(vec![ConfigError::NotAMapping])),
        };

        let mut errors = Vec::new();
        let mut raw = RawFields::default();

        for (key, value) in mapping {
            let key = match key {
                Value::String(key) => key,
                other => {
                    errors.push(ConfigError::UnknownKey(render_key(&other)));
                    continue;
                }
            };

            // an explicit null reads as "not set"
            if value.is_null() {
                continue;
            }

            match key.as_str() {
                "duration" => raw.duration = Some(value),
                "until" => raw.until = Some(value),
                "while" => raw.while_ = Some(value),
                "sleep" => raw.sleep = Some(value),
                "tries" => raw.tries = Some(value),
                "on_success" => raw.on_success = Some(value),
                "on_failure" => raw.on_failure = Some(value),
                "message" => raw.message = Some(value),
                _ => errors.push(ConfigError::UnknownKey(key)),
            }
        }

        let present_modes: Vec<&'static str> = [
            ("duration", raw.duration.is_some()),
            ("until", raw.until.is_some()),
            ("while", raw.while_.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect();

        match present_modes.len() {
            0 => errors.push(ConfigError::MissingMode),
            1 => {}
            _ => errors.push(ConfigError::ConflictingModes(present_modes)),
        }

        let duration = raw
            .duration
            .and_then(|v| collect(&mut errors, parse_span("duration", v)));
        let until = raw
            .until
            .and_then(|v| collect(&mut errors, parse_command("until", v)));
        let while_ = raw
            .while_
            .and_then(|v| collect(&mut errors, parse_command("while", v)));
        let sleep = raw
            .sleep
            .and_then(|v| collect(&mut errors, parse_sleep(v)));
        let tries = raw
            .tries
            .and_then(|v| collect(&mut errors, parse_tries(v)));
        let on_success = raw
            .on_success
            .and_then(|v| collect(&mut errors, parse_command("on_success", v)));
        let on_failure = raw
            .on_failure
            .and_then(|v| collect(&mut errors, parse_command("on_failure", v)));
        let message = raw
            .message
            .and_then(|v| collect(&mut errors, parse_message(v)))
            .flatten();

        if !errors.is_empty() {
            return Err(ConfigErrors::new(errors));
        }

        let mode = match (duration, until, while_) {
            (Some(duration), None, None) => WaitMode::Fixed(duration),
            (None, Some(check), None) => WaitMode::Until(check),
            (None, None, Some(check)) => WaitMode::While(check),
            // exclusivity was checked above
            _ => return Err(ConfigErrors::new(vec![ConfigError::MissingMode])),
        };

        if let WaitMode::Fixed(_) = mode {
            for (field, set) in [
                ("sleep", sleep.is_some()),
                ("tries", tries.is_some()),
                ("on_failure", on_failure.is_some()),
            ] {
                if set {
                    warn!("'{}' has no effect on a fixed duration wait", field);
                }
            }
        }

        let mut spec = WaitSpec::with_mode(mode);
        if let Some(sleep) = sleep {
            spec = spec.with_sleep(sleep);
        }
        if let Some(tries) = tries {
            spec = spec.with_max_tries(tries);
        }
        spec.on_success = on_success;
        spec.on_failure = on_failure;
        spec.message = message;

        debug!("Validated wait spec: {}", spec);
        Ok(spec)
    }
}

impl fmt::Display for WaitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mode {
            WaitMode::Fixed(duration) => write!(f, "wait {}", duration)?,
            WaitMode::Until(check) | WaitMode::While(check) => {
                write!(f, "{} {} every {}", self.mode.name(), check, self.sleep)?;
                if self.is_unbounded() {
                    write!(f, ", unlimited tries")?;
                } else {
                    write!(f, ", up to {} tries", self.max_tries)?;
                }
            }
        }
        if let Some(action) = &self.on_success {
            write!(f, "; on_success: {}", action)?;
        }
        if let Some(action) = &self.on_failure {
            write!(f, "; on_failure: {}", action)?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct RawFields {
    duration: Option<Value>,
    until: Option<Value>,
    while_: Option<Value>,
    sleep: Option<Value>,
    tries: Option<Value>,
    on_success: Option<Value>,
    on_failure: Option<Value>,
    message: Option<Value>,
}

fn collect<T>(errors: &mut Vec<ConfigError>, result: Result<T, Vec<ConfigError>>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(mut found) => {
            errors.append(&mut found);
            None
        }
    }
}

fn normalize_sleep(sleep: WaitDuration) -> WaitDuration {
    if sleep.is_zero() {
        DEFAULT_SLEEP
    } else {
        sleep
    }
}

fn normalize_tries(tries: u32) -> u32 {
    if tries == 0 {
        UNBOUNDED_TRIES
    } else {
        tries
    }
}

fn render_key(key: &Value) -> String {
    serde_yaml::to_string(key)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| format!("{:?}", key))
}

/// Duration strings, or whole seconds given as an integer
fn parse_span(field: &str, value: Value) -> Result<WaitDuration, Vec<ConfigError>> {
    match value {
        Value::String(text) => text
            .parse::<WaitDuration>()
            .map_err(|e| vec![ConfigError::invalid(field, e)]),
        Value::Number(number) => number
            .as_u64()
            .map(WaitDuration::from_secs)
            .ok_or_else(|| {
                vec![ConfigError::invalid(
                    field,
                    format!("expected a non-negative whole number of seconds, got {}", number),
                )]
            }),
        other => Err(vec![ConfigError::invalid(
            field,
            format!("expected a duration string, got {}", type_name(&other)),
        )]),
    }
}

/// Like [`parse_span`], but a negative interval falls back to the default
fn parse_sleep(value: Value) -> Result<WaitDuration, Vec<ConfigError>> {
    let negative = match &value {
        Value::String(text) => matches!(
            text.parse::<WaitDuration>(),
            Err(DurationParseError::Negative(_))
        ),
        Value::Number(number) => number.as_i64().is_some_and(|n| n < 0),
        _ => false,
    };
    if negative {
        warn!("Negative sleep interval, using {}", DEFAULT_SLEEP);
        return Ok(DEFAULT_SLEEP);
    }
    parse_span("sleep", value)
}

fn parse_tries(value: Value) -> Result<u32, Vec<ConfigError>> {
    let count: i64 = match &value {
        Value::Number(number) => number.as_i64().ok_or_else(|| {
            vec![ConfigError::invalid(
                "tries",
                format!("expected a whole number, got {}", number),
            )]
        })?,
        Value::String(text) => text.trim().parse().map_err(|_| {
            vec![ConfigError::invalid(
                "tries",
                format!("expected a whole number, got '{}'", text),
            )]
        })?,
        other => {
            return Err(vec![ConfigError::invalid(
                "tries",
                format!("expected a whole number, got {}", type_name(other)),
            )])
        }
    };

    if count < 0 {
        return Err(vec![ConfigError::invalid(
            "tries",
            format!("must not be negative, got {}", count),
        )]);
    }
    u32::try_from(count).map_err(|_| {
        vec![ConfigError::invalid(
            "tries",
            format!("must be at most {}, got {}", u32::MAX, count),
        )]
    })
}

fn parse_command(field: &str, value: Value) -> Result<Command, Vec<ConfigError>> {
    Command::from_value(value).map_err(|problems| {
        problems
            .into_iter()
            .map(|problem| ConfigError::invalid(field, problem))
            .collect()
    })
}

fn parse_message(value: Value) -> Result<Option<String>, Vec<ConfigError>> {
    match value {
        Value::String(text) if text.is_empty() => Ok(None),
        Value::String(text) => Ok(Some(text)),
        other => Err(vec![ConfigError::invalid(
            "message",
            format!("expected a string, got {}", type_name(&other)),
        )]),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
