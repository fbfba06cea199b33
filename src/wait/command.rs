//! Command descriptors for checks and outcome actions
//!
//! A command tells the command runner *what* to execute: which interpreter
//! to hand it to, and whether the body is an inline snippet or a script
//! file. The wait controller never looks inside a command, it only passes
//! it on to the runner.
//!
//! # Examples
//!
//! ## Inline check
//!
//! **YAML Format:**
//! ```yaml
//! until:
//!   type: shell
//!   inline:
//!     - test -f /var/lib/cloud/instance/boot-finished
//! ```
//!
//! **JSON Format:**
//! ```json
//! {
//!   "until": {
//!     "type": "powershell",
//!     "inline": "if ($ready) { exit 0 } else { exit 1 }"
//!   }
//! }
//! ```
//!
//! ## Script action
//!
//! **TOML Format:**
//! ```toml
//! [on_failure]
//! type = "powershell"
//! script = "./scripts/Backup-Logs.ps1"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Interpreter a command is handed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// POSIX shell (`sh -c` for inline bodies)
    Shell,
    /// PowerShell (`-Command` for inline bodies, `-File` for scripts)
    Powershell,
}

impl ExecutorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorKind::Shell => "shell",
            ExecutorKind::Powershell => "powershell",
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the body of a command comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSource {
    /// Inline snippet, one entry per line
    Inline(Vec<String>),
    /// Path to a script file
    Script(PathBuf),
}

/// A validated command descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub executor: ExecutorKind,
    pub source: CommandSource,
    /// Extra environment for the spawned process
    pub environment: BTreeMap<String, String>,
}

impl Command {
    pub fn inline(executor: ExecutorKind, lines: &[&str]) -> Self {
        Command {
            executor,
            source: CommandSource::Inline(lines.iter().map(|l| l.to_string()).collect()),
            environment: BTreeMap::new(),
        }
    }

    pub fn script(executor: ExecutorKind, path: impl Into<PathBuf>) -> Self {
        Command {
            executor,
            source: CommandSource::Script(path.into()),
            environment: BTreeMap::new(),
        }
    }

    /// Inline body joined into a single script, `None` for script commands
    pub fn inline_body(&self) -> Option<String> {
        match &self.source {
            CommandSource::Inline(lines) => Some(lines.join("\n")),
            CommandSource::Script(_) => None,
        }
    }

    /// Decode a command descriptor, reporting every problem found
    pub fn from_value(value: serde_yaml::Value) -> Result<Self, Vec<String>> {
        let raw: RawCommand = serde_yaml::from_value(value).map_err(|e| vec![e.to_string()])?;
        raw.try_into()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            CommandSource::Inline(lines) if lines.len() == 1 => {
                write!(f, "{} inline `{}`", self.executor, lines[0])
            }
            CommandSource::Inline(lines) => {
                write!(f, "{} inline ({} lines)", self.executor, lines.len())
            }
            CommandSource::Script(path) => {
                write!(f, "{} script {}", self.executor, path.display())
            }
        }
    }
}

/// Inline bodies may be written as one string or as a list of lines
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum InlineBody {
    One(String),
    Lines(Vec<String>),
}

/// Command descriptor as written in configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCommand {
    #[serde(rename = "type")]
    executor: ExecutorKind,
    #[serde(default)]
    inline: Option<InlineBody>,
    #[serde(default)]
    script: Option<PathBuf>,
    #[serde(default)]
    environment_vars: BTreeMap<String, String>,
}

impl TryFrom<RawCommand> for Command {
    type Error = Vec<String>;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        let mut problems = Vec::new();

        let inline = raw.inline.map(|body| match body {
            InlineBody::One(line) => vec![line],
            InlineBody::Lines(lines) => lines,
        });

        if let Some(lines) = &inline {
            if lines.iter().all(|l| l.trim().is_empty()) {
                problems.push("inline body cannot be empty".to_string());
            }
        }
        if let Some(path) = &raw.script {
            if path.as_os_str().is_empty() {
                problems.push("script path cannot be empty".to_string());
            }
        }
        for key in raw.environment_vars.keys() {
            if key.is_empty() || key.contains('=') {
                problems.push(format!("invalid environment variable name '{}'", key));
            }
        }

        let source = match (inline, raw.script) {
            (Some(lines), None) => Some(CommandSource::Inline(lines)),
            (None, Some(path)) => Some(CommandSource::Script(path)),
            (Some(_), Some(_)) => {
                problems.push("only one of 'inline' or 'script' may be set".to_string());
                None
            }
            (None, None) => {
                problems.push("one of 'inline' or 'script' is required".to_string());
                None
            }
        };

        match source {
            Some(source) if problems.is_empty() => Ok(Command {
                executor: raw.executor,
                source,
                environment: raw.environment_vars,
            }),
            _ => Err(problems),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(yaml: &str) -> Result<Command, Vec<String>> {
        Command::from_value(serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn test_inline_string_and_list() {
        let one = decode("type: powershell\ninline: \"exit 0\"").unwrap();
        assert_eq!(one.executor, ExecutorKind::Powershell);
        assert_eq!(one.source, CommandSource::Inline(vec!["exit 0".to_string()]));

        let many = decode("type: shell\ninline:\n  - echo one\n  - echo two").unwrap();
        assert_eq!(many.inline_body(), Some("echo one\necho two".to_string()));
    }

    #[test]
    fn test_script_with_environment() {
        let cmd = decode(
            "type: shell\nscript: ./scripts/ready.sh\nenvironment_vars:\n  STAGE: boot",
        )
        .unwrap();
        assert_eq!(cmd.source, CommandSource::Script(PathBuf::from("./scripts/ready.sh")));
        assert_eq!(cmd.environment.get("STAGE"), Some(&"boot".to_string()));
        assert_eq!(cmd.inline_body(), None);
    }

    #[test]
    fn test_inline_and_script_conflict() {
        let problems = decode("type: shell\ninline: \"true\"\nscript: ./x.sh").unwrap_err();
        assert_eq!(problems, vec!["only one of 'inline' or 'script' may be set"]);
    }

    #[test]
    fn test_missing_body_and_bad_env_reported_together() {
        let problems = decode("type: shell\nenvironment_vars:\n  \"A=B\": x").unwrap_err();
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.contains("invalid environment variable")));
        assert!(problems.iter().any(|p| p.contains("is required")));
    }

    #[test]
    fn test_structural_errors() {
        assert!(decode("type: cmd\ninline: dir").is_err());
        assert!(decode("inline: \"true\"").is_err());

        let unknown = decode("type: shell\ninline: \"true\"\nexecute_command: sudo").unwrap_err();
        assert!(unknown[0].contains("execute_command"));

        let empty = decode("type: shell\ninline: []").unwrap_err();
        assert_eq!(empty, vec!["inline body cannot be empty"]);
    }

    #[test]
    fn test_display() {
        let cmd = Command::inline(ExecutorKind::Shell, &["true"]);
        assert_eq!(cmd.to_string(), "shell inline `true`");
        let script = Command::script(ExecutorKind::Powershell, "a.ps1");
        assert_eq!(script.to_string(), "powershell script a.ps1");
    }
}
