// ledgermatch - statement and invoice reconciliation against a ledger extract

mod exit_codes;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "ledgermatch")]
#[command(about = "Reconcile bank statements and purchase invoices against ledger entries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  ledgermatch run statement.recon.toml
  ledgermatch run statement.recon.toml --json
  ledgermatch run invoices.recon.toml --output result.json --csv result.csv
  ledgermatch run statement.recon.toml --today 2024-06-01")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file (overrides [output].json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write flat CSV output to file (overrides [output].csv)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Date (YYYY-MM-DD) used for cells whose date cannot be read;
        /// defaults to the local date
        #[arg(long, value_name = "DATE")]
        today: Option<NaiveDate>,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  ledgermatch validate statement.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Engine and CLI log records go to stderr, filtered by `LEDGERMATCH_LOG`
/// (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("LEDGERMATCH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Run { config, json, output, csv, today } => recon::cmd_run(config, json, output, csv, today),
        Commands::Validate { config } => recon::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
