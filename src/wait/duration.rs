//! Duration values for wait configuration
//!
//! Wait configurations express time spans the way image-build templates
//! usually do: `"20s"`, `"1m30s"`, `"250ms"`, `"1.5h"`. A [`WaitDuration`]
//! is parsed exactly once while the configuration is validated and carried
//! around as an immutable value afterwards.
//!
//! # Examples
//!
//! **YAML Format:**
//! ```yaml
//! duration: 1m30s
//! sleep: 500ms
//! ```
//!
//! **JSON Format:**
//! ```json
//! { "duration": "1m30s", "sleep": "500ms" }
//! ```
//!
//! **TOML Format:**
//! ```toml
//! duration = "1m30s"
//! sleep = "500ms"
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;

/// Reasons a duration string can be rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("duration is empty")]
    Empty,

    #[error("negative duration '{0}' is not allowed")]
    Negative(String),

    #[error("invalid duration '{0}'")]
    Invalid(String),

    #[error("missing unit in duration '{0}'")]
    MissingUnit(String),

    #[error("unknown unit '{unit}' in duration '{input}'")]
    UnknownUnit { unit: String, input: String },

    #[error("duration '{0}' is too large")]
    Overflow(String),
}

/// A non-negative time span parsed from a Go-style duration string
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaitDuration(Duration);

impl WaitDuration {
    /// Zero-length span
    pub const ZERO: WaitDuration = WaitDuration(Duration::ZERO);

    pub const fn from_secs(secs: u64) -> Self {
        WaitDuration(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        WaitDuration(Duration::from_millis(millis))
    }

    /// The underlying span
    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Duration> for WaitDuration {
    fn from(duration: Duration) -> Self {
        WaitDuration(duration)
    }
}

impl From<WaitDuration> for Duration {
    fn from(duration: WaitDuration) -> Self {
        duration.0
    }
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

impl FromStr for WaitDuration {
    type Err = DurationParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DurationParseError::Empty);
        }

        let (negative, body) = match trimmed.as_bytes()[0] {
            b'-' => (true, &trimmed[1..]),
            b'+' => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        if body == "0" {
            return Ok(WaitDuration::ZERO);
        }
        if body.is_empty() {
            return Err(DurationParseError::Invalid(input.to_string()));
        }

        let mut total: u128 = 0;
        let mut rest = body;

        while !rest.is_empty() {
            // integer part
            let int_len = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
            let int_digits = &rest[..int_len];
            rest = &rest[int_len..];

            // optional fraction
            let mut frac_digits = "";
            if let Some(after_dot) = rest.strip_prefix('.') {
                let frac_len = after_dot.bytes().take_while(|b| b.is_ascii_digit()).count();
                frac_digits = &after_dot[..frac_len];
                rest = &after_dot[frac_len..];
            }

            if int_digits.is_empty() && frac_digits.is_empty() {
                return Err(DurationParseError::Invalid(input.to_string()));
            }

            let unit_len = rest
                .char_indices()
                .find(|(_, c)| c.is_ascii_digit() || *c == '.')
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            let unit = &rest[..unit_len];
            rest = &rest[unit_len..];

            if unit.is_empty() {
                return Err(DurationParseError::MissingUnit(input.to_string()));
            }
            let scale = unit_nanos(unit).ok_or_else(|| DurationParseError::UnknownUnit {
                unit: unit.to_string(),
                input: input.to_string(),
            })?;

            let whole: u128 = if int_digits.is_empty() {
                0
            } else {
                int_digits
                    .parse()
                    .map_err(|_| DurationParseError::Overflow(input.to_string()))?
            };

            let mut value = whole
                .checked_mul(scale)
                .ok_or_else(|| DurationParseError::Overflow(input.to_string()))?;

            // fractional digits beyond nanosecond precision are dropped
            let mut divisor: u128 = 1;
            let mut fraction: u128 = 0;
            for digit in frac_digits.bytes().take(18) {
                fraction = fraction * 10 + u128::from(digit - b'0');
                divisor *= 10;
            }
            value = value
                .checked_add(fraction * scale / divisor)
                .ok_or_else(|| DurationParseError::Overflow(input.to_string()))?;

            total = total
                .checked_add(value)
                .ok_or_else(|| DurationParseError::Overflow(input.to_string()))?;
        }

        if negative && total > 0 {
            return Err(DurationParseError::Negative(input.to_string()));
        }

        let secs = u64::try_from(total / NANOS_PER_SECOND)
            .map_err(|_| DurationParseError::Overflow(input.to_string()))?;
        let nanos = (total % NANOS_PER_SECOND) as u32;

        Ok(WaitDuration(Duration::new(secs, nanos)))
    }
}

impl fmt::Display for WaitDuration {
    /// Formats the span compactly, e.g. `1h2m3s`, `1.5s`, `250ms`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.as_nanos();
        if total == 0 {
            return write!(f, "0s");
        }

        if total < NANOS_PER_SECOND {
            return if total % NANOS_PER_MILLI == 0 {
                write!(f, "{}ms", total / NANOS_PER_MILLI)
            } else if total % NANOS_PER_MICRO == 0 {
                write!(f, "{}us", total / NANOS_PER_MICRO)
            } else {
                write!(f, "{}ns", total)
            };
        }

        let hours = total / NANOS_PER_HOUR;
        let minutes = (total % NANOS_PER_HOUR) / NANOS_PER_MINUTE;
        let seconds = (total % NANOS_PER_MINUTE) / NANOS_PER_SECOND;
        let sub_nanos = total % NANOS_PER_SECOND;

        if hours > 0 {
            write!(f, "{}h", hours)?;
        }
        if hours > 0 || minutes > 0 {
            write!(f, "{}m", minutes)?;
        }
        if sub_nanos == 0 {
            write!(f, "{}s", seconds)
        } else {
            let frac = format!("{:09}", sub_nanos);
            write!(f, "{}.{}s", seconds, frac.trim_end_matches('0'))
        }
    }
}
