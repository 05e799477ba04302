//! CLI Exit Code Registry
//!
//! Single source of truth for `ledgermatch` exit codes. Scripts and schedulers
//! branch on these, so they are part of the shell contract.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success, reconciliation is clean                     |
//! | 1    | Reconciliation ran and found discrepancies           |
//! | 2    | Usage error (bad arguments)                          |
//! | 3    | Invalid config (parse, validation, missing role)     |
//! | 4    | Runtime error (unreadable input, ledger parse, IO)   |

/// Success - command completed, nothing left unreconciled.
pub const EXIT_SUCCESS: u8 = 0;

/// Mismatched amounts, or records missing on either side.
pub const EXIT_RECON_DISCREPANCIES: u8 = 1;

/// Usage error - bad arguments. clap reports its own parse failures with
/// the same code.
pub const EXIT_USAGE: u8 = 2;

/// Config cannot be parsed or fails validation.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 3;

/// Input or output failure while running.
pub const EXIT_RECON_RUNTIME: u8 = 4;

use ledgermatch_recon::ReconError;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::MissingRole { .. } => EXIT_RECON_INVALID_CONFIG,
        ReconError::MissingColumn { .. }
        | ReconError::Csv(_)
        | ReconError::Io(_) => EXIT_RECON_RUNTIME,
    }
}
