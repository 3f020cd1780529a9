//! pNFS data-server gateway serving file data from a backing filesystem.
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, error, info, warn};

mod stress;
mod trc;

use dsgate::config::Config;

use crate::stress::StressArgs;
use crate::trc::Trc;

#[derive(Parser)]
#[command(version, about = "pNFS data-server gateway.")]
struct Args {
    #[arg(
        short,
        long,
        value_parser,
        help = "Optional path to a dsgate config TOML."
    )]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and validate the configuration, then print the effective settings.
    Check,

    /// Drive concurrent data-server I/O through one export and report cache statistics.
    Stress(StressArgs),
}

/// Main entry point for the application.
fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = Trc::default().init() {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(args.config_path.as_deref()) {
        Ok(config) => config,
        Err(dsgate::config::ConfigError::ValidationErrors(messages)) => {
            error!("Configuration is invalid.");
            for msg in &messages {
                error!(" - {msg}");
            }
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    debug!(config = ?config, "Configuration loaded.");

    match args.command {
        Command::Check => match config.to_toml() {
            Ok(rendered) => {
                info!("Configuration is valid.");
                print!("{rendered}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to render configuration: {e}");
                ExitCode::FAILURE
            }
        },
        Command::Stress(stress_args) => match stress::run(&config, &stress_args) {
            Ok(report) => {
                if report.failed > 0 {
                    warn!(failed = report.failed, "some operations failed");
                }
                println!("{report}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Stress run failed: {e}");
                ExitCode::FAILURE
            }
        },
    }
}
