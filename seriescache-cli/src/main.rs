//! SeriesCache CLI - Command-line interface
//!
//! Drives a windowed series cache against a synthetic data source and
//! inspects loader configuration files.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use seriescache::logging::{init_logging, LogConfig, DEFAULT_LOG_LEVEL};

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "seriescache")]
#[command(version, about = "Windowed series cache simulator", long_about = None)]
struct Cli {
    /// Loader configuration file (INI, [loader] section)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter directive (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll a chart window over a synthetic candle series
    Simulate {
        /// Sample spacing in ticks
        #[arg(long, default_value = "60")]
        resolution: i64,

        /// Current moment; nothing exists after it
        #[arg(long, default_value = "1000000")]
        now: i64,

        /// How far before "now" the series begins
        #[arg(long, default_value = "100000")]
        history: i64,

        /// Visible window width in ticks
        #[arg(long, default_value = "6000")]
        width: i64,

        /// Distance the window moves back each frame
        #[arg(long, default_value = "600")]
        step: i64,

        /// Number of frames to render
        #[arg(long, default_value = "200")]
        frames: usize,

        /// Base fetch latency in milliseconds
        #[arg(long, default_value = "20")]
        latency_ms: u64,

        /// Cancel loads that take longer than this (milliseconds)
        #[arg(long)]
        deadline_ms: Option<u64>,

        /// Seed for the synthetic series
        #[arg(long, default_value = "1")]
        seed: u64,

        /// Also maintain a derived midpoint series
        #[arg(long)]
        derived: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect loader configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut log_config = LogConfig::default().with_level(cli.log_level);
    if let Some(path) = cli.log_file {
        log_config = log_config.with_file(path);
    }
    let _log_guard = init_logging(&log_config)?;

    match cli.command {
        Commands::Simulate {
            resolution,
            now,
            history,
            width,
            step,
            frames,
            latency_ms,
            deadline_ms,
            seed,
            derived,
            json,
        } => {
            if resolution <= 0 || width < 0 || step <= 0 {
                return Err(CliError::Config(
                    "resolution and step must be positive, width non-negative".to_string(),
                ));
            }
            let config = commands::config::load(cli.config.as_deref())?;
            let args = SimulateArgs {
                resolution,
                now,
                history,
                width,
                step,
                frames,
                latency_ms,
                deadline_ms,
                seed,
                derived,
                json,
            };
            commands::simulate::run(args, config)
        }
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
    }
}
