//! `ledgermatch-recon`: statement-to-ledger reconciliation engine.
//!
//! Pure engine crate: receives rows already read by the caller, returns a
//! classified report. No CLI, network or UI dependencies.

pub mod aggregate;
pub mod config;
pub mod date;
pub mod engine;
pub mod error;
pub mod export;
pub mod extract;
pub mod ledger;
pub mod matcher;
pub mod model;
pub mod numeric;

pub use config::{ColumnMapping, MatchPolicy, ReconConfig, StrategyKind};
pub use engine::{reconcile, run, ReconOptions};
pub use error::ReconError;
pub use extract::{extract_all, extract_record, load_csv_rows, ExtractContext};
pub use ledger::{ledger_to_canonical, CsvLedgerSource, LedgerQuery, LedgerRow, LedgerSource};
pub use matcher::{CrossAmountMatcher, KeyedAmountMatcher, Matcher};
pub use model::{CanonicalTransaction, CellValue, MatchResult, RawRow, ReconReport};
