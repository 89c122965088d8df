use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use otoshi_updater::commands::{self, launch_program, watch_status};
use otoshi_updater::errors::Result;
use otoshi_updater::logging;
use otoshi_updater::utils::paths::resolve_install_root;
use otoshi_updater::{Updater, UpdaterConfig, UpdaterState};

#[derive(Parser, Debug)]
#[command(name = "otoshi-updater", version, about = "Keeps an install directory in sync with a remote manifest")]
struct Cli {
    /// Manifest URL (overrides config file and environment)
    #[arg(long, global = true)]
    manifest_url: Option<String>,

    /// Install root (defaults to the executable's directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Write logs to a daily-rolling file in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Seconds without new bytes before a download is abandoned
    #[arg(long, global = true)]
    stall_timeout: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the manifest and report which files would be downloaded
    Check,
    /// Check, then download and commit any queued files
    Install {
        /// Extra attempts after a failed batch
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },
    /// Make sure the install is current, then start the given program
    Play {
        /// Install pending updates without asking
        #[arg(long, short = 'y')]
        yes: bool,
        /// Program to start, relative to the install root
        program: String,
        /// Arguments passed through to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{}", err);
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.log_dir.as_deref() {
        Some(dir) => logging::init(dir)?,
        None => logging::init_stderr()?,
    }

    let root = match cli.root {
        Some(root) => {
            std::fs::create_dir_all(&root)?;
            std::fs::canonicalize(&root)?
        }
        None => resolve_install_root(),
    };

    let mut config = UpdaterConfig::load(&root)?;
    if let Some(url) = cli.manifest_url {
        config.manifest_url = Some(url);
    }
    if let Some(stall) = cli.stall_timeout.filter(|value| value.is_finite() && *value >= 0.0) {
        config.stall_timeout_secs = stall;
    }
    tracing::info!("[updater] install root {}", root.display());

    let mut updater = Updater::new(config, root.clone());
    let reporter = watch_status(updater.subscribe());

    let code = match cli.command {
        Command::Check => {
            let state = commands::check(&mut updater).await;
            println!("{}", state.as_str());
            ExitCode::SUCCESS
        }
        Command::Install { retries } => {
            let state = commands::install(&mut updater, retries).await;
            exit_for(state)
        }
        Command::Play { yes, program, args } => {
            let mut state = commands::check(&mut updater).await;
            if state == UpdaterState::ReadyToUpdate {
                if !yes {
                    println!("Updates are available; run `install` or pass --yes to play.");
                    drop(updater);
                    let _ = reporter.await;
                    return Ok(ExitCode::from(2));
                }
                state = updater.install_queued().await;
            }
            if state == UpdaterState::ReadyToPlay {
                let pid = launch_program(&root, &program, &args)?;
                println!("started {program} (pid {pid})");
            }
            exit_for(state)
        }
    };

    drop(updater);
    let _ = reporter.await;
    Ok(code)
}

fn exit_for(state: UpdaterState) -> ExitCode {
    if state == UpdaterState::ReadyToPlay {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
