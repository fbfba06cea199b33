//! Integration tests for waits driven through the public library API
//!
//! These tests use the local command runner, so checks and actions are
//! real processes.

#![cfg(unix)]

use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use provision_wait::config::{load_wait_config, RunnerSettings};
use provision_wait::wait::{
    execute, LocalCommandRunner, Resolution, Ui, WaitError, WaitProvisioner, WaitSpec,
};

struct QuietUi;

impl Ui for QuietUi {
    fn say(&self, _message: &str) {}
}

fn runner_in(dir: &TempDir) -> LocalCommandRunner {
    LocalCommandRunner::new(RunnerSettings {
        working_dir: Some(dir.path().to_path_buf()),
        ..RunnerSettings::default()
    })
}

/// A while wait ends once the lock file disappears
#[tokio::test]
async fn test_while_lock_file_present() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("apt.lock"), "").unwrap();

    let config = temp_dir.path().join("wait.yml");
    fs::write(
        &config,
        r#"
while:
  type: shell
  inline: ["test -f apt.lock"]
sleep: 20ms
tries: 50
on_success:
  type: shell
  inline: ["touch done"]
"#,
    )
    .unwrap();

    let spec = WaitSpec::from_value(load_wait_config(&config).unwrap()).unwrap();
    let runner = runner_in(&temp_dir);

    let lock = temp_dir.path().join("apt.lock");
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::remove_file(lock).unwrap();
    });

    let outcome = execute(&spec, &QuietUi, &runner, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.resolution, Resolution::Succeeded);
    assert!(outcome.attempts >= 2);
    assert!(temp_dir.path().join("done").exists());
}

/// Exhausted waits run the failure script
#[tokio::test]
async fn test_until_exhausted_runs_failure_script() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("collect-logs.sh"),
        "echo collected > logs.txt\n",
    )
    .unwrap();

    let raw = serde_yaml::from_str(
        r#"
until: { type: shell, inline: "exit 3" }
sleep: 10ms
tries: "2"
on_failure: { type: shell, script: ./collect-logs.sh }
"#,
    )
    .unwrap();
    let provisioner = WaitProvisioner::prepare(raw).unwrap();

    let outcome = provisioner
        .provision(&QuietUi, &runner_in(&temp_dir))
        .await
        .unwrap();

    assert_eq!(outcome.resolution, Resolution::Exhausted);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.last_exit_code, Some(3));
    assert!(outcome.action_errors.is_empty());
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("logs.txt")).unwrap(),
        "collected\n"
    );
}

/// Canceling from another task stops a long wait promptly
#[tokio::test]
async fn test_cancel_long_fixed_wait() {
    let raw = serde_yaml::from_str("duration: 1h").unwrap();
    let provisioner = WaitProvisioner::prepare(raw).unwrap();
    let temp_dir = TempDir::new().unwrap();

    let handle = provisioner.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        provisioner.provision(&QuietUi, &runner_in(&temp_dir)),
    )
    .await
    .expect("wait should stop after cancellation")
    .unwrap();

    assert_eq!(outcome.resolution, Resolution::Canceled);
}

/// A missing interpreter aborts the wait as an infrastructure error
#[tokio::test]
async fn test_missing_interpreter_aborts() {
    let temp_dir = TempDir::new().unwrap();
    let raw = serde_yaml::from_str(
        "until: { type: powershell, inline: \"exit 0\" }\non_failure: { type: shell, inline: \"touch failed\" }",
    )
    .unwrap();
    let provisioner = WaitProvisioner::prepare(raw).unwrap();
    let runner = LocalCommandRunner::new(RunnerSettings {
        powershell: "/nonexistent/pwsh".to_string(),
        working_dir: Some(temp_dir.path().to_path_buf()),
        ..RunnerSettings::default()
    });

    let err = provisioner.provision(&QuietUi, &runner).await.unwrap_err();

    assert!(matches!(err, WaitError::Infrastructure { attempts: 1, .. }));
    assert!(!temp_dir.path().join("failed").exists());
}
