//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: schedulers and wrapper
//! scripts rely on them.
//!
//! | Code | Meaning                                                    |
//! |------|------------------------------------------------------------|
//! | 0    | Success (run recorded, notified if configured)             |
//! | 1    | General error (e.g. amounts too large to reconcile)        |
//! | 2    | Usage or configuration error                               |
//! | 3    | Sources not found (terminal no-op, nothing recorded)       |
//! | 4    | Empty or unreadable source (nothing recorded)              |
//! | 5    | History store failure (run computed and printed)           |
//! | 6    | Notifier failure (run recorded)                            |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `recon_exit_code` if an engine error maps to it

use reconbot_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable or invalid config.
pub const EXIT_USAGE: u8 = 2;

/// One or both source files were not found. Nothing was computed.
pub const EXIT_NO_SOURCES: u8 = 3;

/// A source had no usable rows, or could not be parsed at all.
pub const EXIT_EMPTY_SOURCE: u8 = 4;

/// The run was computed but the history file could not be written.
pub const EXIT_HISTORY: u8 = 5;

/// The run was recorded but delivery to the webhook failed.
pub const EXIT_NOTIFY: u8 = 6;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_USAGE,
        ReconError::SourceUnavailable { .. } => EXIT_NO_SOURCES,
        ReconError::EmptySource { .. } => EXIT_EMPTY_SOURCE,
        ReconError::HistoryStore(_) => EXIT_HISTORY,
        ReconError::Notify(_) => EXIT_NOTIFY,
        ReconError::AmountOverflow(_) => EXIT_ERROR,
    }
}
