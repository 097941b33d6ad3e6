//! Bankmail CLI - bank notification emails into a local ledger

use std::process::ExitCode;

use anyhow::Result;
use bankmail_core::logging::{init_logging, LogConfig};
use clap::{ArgAction, Parser, Subcommand};

mod commands;
mod output;

use commands::{list, pull, show, sources, status};

/// Bankmail - pull bank notification emails into a local transaction ledger
#[derive(Parser)]
#[command(name = "bm", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch notifications from the email reader and store new transactions
    Pull(pull::PullArgs),

    /// List stored transactions
    List(list::ListArgs),

    /// Show a single transaction
    Show {
        /// Transaction ID (64-character hex digest)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show stored transaction summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List configured bank sources
    Sources {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.verbose) {
        output::error(&format!("{:#}", e));
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbose: u8) -> Result<()> {
    let config = LogConfig::from_env()?;
    let level = config.level.raised_by(verbose);
    init_logging(&config.with_level(level))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Pull(args) => pull::run(args),
        Commands::List(args) => list::run(args),
        Commands::Show { id, json } => show::run(&id, json),
        Commands::Status { json } => status::run(json),
        Commands::Sources { json } => sources::run(json),
    }
}
