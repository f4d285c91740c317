//! versions-cleaner - prune and purge version histories

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli_lib::overrides::ConfigOverrides;
use cli_lib::{logging, settings};
use cleaner::CleanerConfig;
use std::path::{Path, PathBuf};

mod cmd;

/// Garbage collector for the version histories of a repository
#[derive(Parser)]
#[command(name = "versions-cleaner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/versions-cleaner/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the checkpoint, markers and lock
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Mirror logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the version histories of a repository file
    Run {
        /// Repository file (JSON) to clean; rewritten when the run ends
        #[arg(short, long, value_name = "FILE")]
        repository: PathBuf,

        /// Print the run statistics as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },
    /// Show the saved position, pending markers and the running instance
    Status,
    /// Forget the saved position so the next run starts from the beginning
    Reset,
    /// Ask the running instance to stop at its next suspension point
    Interrupt,
    /// Change the pause between deletions of the running instance
    Pause {
        /// Pause in milliseconds (<= 0 = none)
        #[arg(allow_negative_numbers = true, required_unless_present = "clear")]
        millis: Option<i64>,

        /// Remove the override and fall back to the configured pause
        #[arg(long, conflicts_with = "millis")]
        clear: bool,
    },
    /// Show or create the configuration file
    Config {
        /// Print the configuration file path only
        #[arg(long)]
        path: bool,

        /// Print an example configuration with every default
        #[arg(long, conflicts_with = "path")]
        example: bool,

        /// Write the default configuration if no file exists yet
        #[arg(long, conflicts_with_all = ["path", "example"])]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let _log_guard = logging::init(default_level, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Run {
            repository,
            json,
            overrides,
        } => {
            let mut config = load_config(cli.config.as_deref(), cli.state_dir)?;
            overrides.apply(&mut config);
            config.validate().context("Invalid configuration")?;
            cmd::run::run(config, &repository, json).await
        }
        Commands::Status => cmd::status::run(&load_config(cli.config.as_deref(), cli.state_dir)?).await,
        Commands::Reset => cmd::reset::run(&load_config(cli.config.as_deref(), cli.state_dir)?).await,
        Commands::Interrupt => {
            cmd::interrupt::run(&load_config(cli.config.as_deref(), cli.state_dir)?).await
        }
        Commands::Pause { millis, clear } => {
            let config = load_config(cli.config.as_deref(), cli.state_dir)?;
            cmd::pause::run(&config, millis, clear).await
        }
        Commands::Config {
            path,
            example,
            init,
        } => {
            if path {
                cmd::config::run_path(cli.config.as_deref()).await
            } else if example {
                cmd::config::run_example().await
            } else if init {
                cmd::config::run_init(cli.config.as_deref()).await
            } else {
                let config = load_config(cli.config.as_deref(), cli.state_dir)?;
                cmd::config::run_show(&config, cli.config.as_deref()).await
            }
        }
    }
}

/// Configuration file values with the global `--state-dir` applied
fn load_config(explicit: Option<&Path>, state_dir: Option<PathBuf>) -> Result<CleanerConfig> {
    let mut config = settings::load(explicit)?;
    if state_dir.is_some() {
        config.state_dir = state_dir;
    }
    Ok(config)
}
