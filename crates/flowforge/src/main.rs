mod commands;
mod error;
mod scenarios;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use flowforge_engine::WorkflowSettings;
use tracing_subscriber::EnvFilter;

use crate::commands::Commands;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "flowforge")]
#[command(about = "Run the flowforge sample workflows", long_about = None)]
struct Cli {
    /// Engine settings file (TOML); defaults apply when omitted
    #[arg(long = "config", short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Log engine activity at debug level (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match load_settings(cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            print_error(&e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = cli.command.execute(settings) {
        print_error(&e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(path: Option<PathBuf>) -> Result<WorkflowSettings, CliError> {
    match path {
        Some(path) => Ok(WorkflowSettings::from_path(&path)?),
        None => Ok(WorkflowSettings::default()),
    }
}

fn print_error(error: &CliError) {
    eprintln!("error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("caused by: {cause}");
        source = std::error::Error::source(cause);
    }
}
