//! Configuration loading for provision-wait
//!
//! This module reads wait configuration files and holds the settings of the
//! local command runner.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_shell() -> String {
    "sh".to_string()
}

fn default_powershell() -> String {
    if cfg!(windows) {
        "powershell".to_string()
    } else {
        "pwsh".to_string()
    }
}

/// Settings for running commands as local processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Interpreter for `shell` commands, may include arguments (e.g. `bash -eu`)
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Interpreter for `powershell` commands
    #[serde(default = "default_powershell")]
    pub powershell: String,
    /// Working directory for spawned commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            powershell: default_powershell(),
            working_dir: None,
        }
    }
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick a format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("yml") | Some("yaml") => Some(ConfigFormat::Yaml),
            Some("json") => Some(ConfigFormat::Json),
            Some("toml") => Some(ConfigFormat::Toml),
            _ => None,
        }
    }
}

/// Parse configuration text into a generic value for validation
pub fn parse_wait_config(contents: &str, format: ConfigFormat) -> Result<serde_yaml::Value> {
    let value = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(contents).context("Failed to parse YAML")?,
        ConfigFormat::Json => serde_json::from_str(contents).context("Failed to parse JSON")?,
        ConfigFormat::Toml => {
            let table: toml::Value = toml::from_str(contents).context("Failed to parse TOML")?;
            serde_yaml::to_value(table).context("Failed to convert TOML")?
        }
    };
    Ok(value)
}

/// Load a wait configuration file
///
/// The format is chosen by extension (`.yml`/`.yaml`, `.json`, `.toml`).
/// The result is only decoded, not validated; hand it to
/// [`WaitSpec::from_value`](crate::wait::WaitSpec::from_value).
pub fn load_wait_config(path: &Path) -> Result<serde_yaml::Value> {
    let format = ConfigFormat::from_path(path).ok_or_else(|| {
        anyhow::anyhow!(
            "Unsupported configuration format: {} (expected .yml, .yaml, .json or .toml)",
            path.display()
        )
    })?;

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file '{}'", path.display()))?;

    parse_wait_config(&contents, format)
        .with_context(|| format!("Invalid configuration file '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_runner_settings() {
        let settings = RunnerSettings::default();
        assert_eq!(settings.shell, "sh");
        assert!(settings.working_dir.is_none());
    }

    #[test]
    fn test_runner_settings_partial_yaml() {
        let settings: RunnerSettings = serde_yaml::from_str("shell: bash -eu").unwrap();
        assert_eq!(settings.shell, "bash -eu");
        assert_eq!(settings.powershell, default_powershell());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("wait.yml")),
            Some(ConfigFormat::Yaml)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("wait.json")),
            Some(ConfigFormat::Json)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("wait.toml")),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(ConfigFormat::from_path(Path::new("wait.ini")), None);
    }

    #[test]
    fn test_load_yaml_config() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("wait.yml");
        fs::write(&path, "duration: 20s\nmessage: Waiting for 20 seconds\n").unwrap();

        let value = load_wait_config(&path).unwrap();
        assert_eq!(value["duration"], serde_yaml::Value::from("20s"));
        assert_eq!(value["message"], serde_yaml::Value::from("Waiting for 20 seconds"));
    }

    #[test]
    fn test_load_json_config() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("wait.json");
        fs::write(
            &path,
            r#"{"until": {"type": "shell", "inline": ["true"]}, "tries": 5}"#,
        )
        .unwrap();

        let value = load_wait_config(&path).unwrap();
        assert_eq!(value["tries"], serde_yaml::Value::from(5));
        assert_eq!(value["until"]["type"], serde_yaml::Value::from("shell"));
    }

    #[test]
    fn test_load_toml_config() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("wait.toml");
        fs::write(
            &path,
            "sleep = \"5s\"\ntries = 12\n\n[while]\ntype = \"shell\"\ninline = [\"pgrep -x apt-get\"]\n",
        )
        .unwrap();

        let value = load_wait_config(&path).unwrap();
        assert_eq!(value["sleep"], serde_yaml::Value::from("5s"));
        assert_eq!(value["while"]["type"], serde_yaml::Value::from("shell"));
    }

    #[test]
    fn test_load_unsupported_extension() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("wait.ini");
        fs::write(&path, "duration=1s").unwrap();

        let err = load_wait_config(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported configuration format"));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("wait.yaml");
        fs::write(&path, "invalid: yaml: content:\n  - [").unwrap();

        let err = load_wait_config(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration file"));
    }
}
