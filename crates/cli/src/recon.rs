//! `ledgermatch run` and `ledgermatch validate`: config-driven reconciliation.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use ledgermatch_recon::export::write_csv;
use ledgermatch_recon::ledger::{ledger_to_canonical, CsvLedgerSource, LedgerQuery, LedgerSource};
use ledgermatch_recon::{extract_all, load_csv_rows, ExtractContext, ReconConfig, ReconError, ReconReport};

use crate::exit_codes::{
    recon_exit_code, EXIT_RECON_DISCREPANCIES, EXIT_RECON_INVALID_CONFIG, EXIT_RECON_RUNTIME, EXIT_USAGE,
};
use crate::CliError;

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError::new(code, msg)
}

fn engine_err(err: ReconError) -> CliError {
    let code = recon_exit_code(&err);
    let hint = match &err {
        ReconError::MissingRole { role, .. } => Some(format!("add `{role} = \"<header>\"` under [statement.columns]")),
        ReconError::MissingColumn { input, .. } if input == "ledger" => {
            Some("map the extract's headers under [ledger.columns]".to_string())
        }
        _ => None,
    };
    let e = recon_err(code, err.to_string());
    match hint {
        Some(h) => e.with_hint(h),
        None => e,
    }
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot read config: {e}")))?;
    ReconConfig::from_toml(&config_str).map_err(engine_err)
}

fn read_input(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot read {}: {e}", path.display())))
}

/// CLI flag wins; otherwise the `[output]` entry, relative to the config file.
fn output_path(flag: Option<PathBuf>, configured: Option<&str>, base_dir: &Path) -> Option<PathBuf> {
    flag.or_else(|| configured.map(|p| base_dir.join(p)))
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    json_file: Option<PathBuf>,
    csv_file: Option<PathBuf>,
    today: Option<NaiveDate>,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let json_file = output_path(json_file, config.output.json.as_deref(), base_dir);
    let csv_file = output_path(csv_file, config.output.csv.as_deref(), base_dir);
    if let (Some(j), Some(c)) = (&json_file, &csv_file) {
        if j == c {
            return Err(recon_err(EXIT_USAGE, format!("JSON and CSV output both target {}", j.display()))
                .with_hint("pass different paths to --output and --csv"));
        }
    }

    let statement_file = config.statement.file.as_deref().ok_or_else(|| {
        recon_err(EXIT_RECON_INVALID_CONFIG, "no statement file configured")
            .with_hint("set `file` under [statement]")
    })?;
    let ledger = config.ledger.as_ref().ok_or_else(|| {
        recon_err(EXIT_RECON_INVALID_CONFIG, "no ledger source configured")
            .with_hint("add a [ledger] section with `file`")
    })?;

    let base_currency = config.base_currency();

    // Statement side
    let statement_path = base_dir.join(statement_file);
    let statement_rows = load_csv_rows(&read_input(&statement_path)?, config.statement.delimiter as u8)
        .map_err(engine_err)?;
    let ctx = match today {
        Some(date) => ExtractContext::new(&base_currency, date),
        None => ExtractContext::today(&base_currency),
    };
    let left = extract_all(&statement_rows, &config.statement.columns, &ctx);

    // Ledger side
    let ledger_path = base_dir.join(&ledger.file);
    let source = CsvLedgerSource::new(
        read_input(&ledger_path)?,
        ledger.delimiter as u8,
        ledger.columns.clone(),
        ctx.today,
    );
    let ledger_rows = source.fetch(&LedgerQuery::from_config(ledger)).map_err(engine_err)?;
    let right = ledger_to_canonical(&ledger_rows, &base_currency);

    let report = ledgermatch_recon::run(&config, &left, &right).map_err(engine_err)?;

    // Output
    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = json_file {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot write output: {e}")))?;
        log::info!("wrote {}", path.display());
    }

    if let Some(ref path) = csv_file {
        let file = File::create(path)
            .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot write {}: {e}", path.display())))?;
        write_csv(&report, BufWriter::new(file)).map_err(engine_err)?;
        log::info!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&report);

    if !report.is_clean() {
        return Err(recon_err(EXIT_RECON_DISCREPANCIES, "discrepancies found"));
    }
    Ok(())
}

/// Human summary to stderr.
fn print_summary(report: &ReconReport) {
    let s = &report.summary;
    eprintln!(
        "{} recon '{}': {} matched, {} amount mismatches, {} statement only, {} ledger only",
        report.meta.strategy,
        report.meta.config_name,
        s.matched_count,
        s.mismatch_count,
        s.left_only_count,
        s.right_only_count,
    );
    if s.dropped_right_count > 0 || s.anomaly_count > 0 {
        eprintln!(
            "{} zero-amount ledger entries skipped, {} records with data-quality anomalies",
            s.dropped_right_count, s.anomaly_count,
        );
    }
    eprintln!("statement total: {}", s.total_amount);
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    eprintln!(
        "valid: {} recon '{}' ({}, tolerance {}, base currency {})",
        config.strategy,
        config.name,
        config.policy,
        config.tolerance,
        config.base_currency(),
    );
    Ok(())
}
