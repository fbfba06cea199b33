use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use provision_wait::config::{load_wait_config, RunnerSettings};
use provision_wait::wait::{ConsoleUi, LocalCommandRunner, Resolution, WaitProvisioner};

const EXIT_EXHAUSTED: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_FATAL: u8 = 3;
const EXIT_CANCELED: u8 = 130;

#[derive(Parser)]
#[command(name = "provision-wait")]
#[command(
    about = "Pause a machine-image build until a duration elapses or a readiness check passes"
)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a wait configuration and run it
    Run {
        /// Wait configuration file (.yml, .yaml, .json or .toml)
        config: PathBuf,
        /// Interpreter for shell commands (default: sh)
        #[arg(long)]
        shell: Option<String>,
        /// Interpreter for powershell commands (default: pwsh, or powershell on Windows)
        #[arg(long)]
        powershell: Option<String>,
        /// Working directory for checks and actions
        #[arg(long)]
        cwd: Option<PathBuf>,
    },
    /// Validate a wait configuration without running it
    Validate {
        /// Wait configuration file (.yml, .yaml, .json or .toml)
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configure logging level, RUST_LOG takes precedence
    let default_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    match cli.command {
        Commands::Validate { config } => match prepare(&config) {
            Ok(provisioner) => {
                println!("Configuration is valid: {}", provisioner.spec());
                ExitCode::SUCCESS
            }
            Err(code) => code,
        },
        Commands::Run {
            config,
            shell,
            powershell,
            cwd,
        } => {
            let provisioner = match prepare(&config) {
                Ok(provisioner) => provisioner,
                Err(code) => return code,
            };

            // Override runner defaults with CLI arguments
            let mut settings = RunnerSettings::default();
            if let Some(shell) = shell {
                settings.shell = shell;
            }
            if let Some(powershell) = powershell {
                settings.powershell = powershell;
            }
            settings.working_dir = cwd;

            run(provisioner, settings).await
        }
    }
}

/// Load and validate a configuration file
fn prepare(path: &Path) -> Result<WaitProvisioner, ExitCode> {
    let raw = load_wait_config(path).map_err(|e| {
        eprintln!("Error: {:#}", e);
        ExitCode::from(EXIT_CONFIG)
    })?;

    WaitProvisioner::prepare(raw).map_err(|errors| {
        eprintln!("Error: {}", errors);
        ExitCode::from(EXIT_CONFIG)
    })
}

async fn run(provisioner: WaitProvisioner, settings: RunnerSettings) -> ExitCode {
    info!("Runner settings: {:?}", settings);
    let runner = LocalCommandRunner::new(settings);

    let token = provisioner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, canceling wait");
            token.cancel();
        }
    });

    let outcome = match provisioner.provision(&ConsoleUi, &runner).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {:#}", anyhow::Error::from(e));
            return ExitCode::from(EXIT_FATAL);
        }
    };

    for warning in &outcome.action_errors {
        eprintln!("Warning: {}", warning);
    }

    println!(
        "Wait {} after {} check(s) in {:.1}s",
        outcome.resolution,
        outcome.attempts,
        outcome.elapsed.as_secs_f64()
    );

    match outcome.resolution {
        Resolution::Succeeded => ExitCode::SUCCESS,
        Resolution::Exhausted => ExitCode::from(EXIT_EXHAUSTED),
        Resolution::Canceled => ExitCode::from(EXIT_CANCELED),
    }
}
