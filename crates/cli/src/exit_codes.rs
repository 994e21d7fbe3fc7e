//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | Usage error (bad arguments, bad dates, bad source)   |
//! | 3    | Required column missing from a dataset               |
//! | 4    | Many-to-one join violated                            |
//! | 5    | SQL console query rejected (denylist or writes)      |
//! | 6    | Database error                                       |
//! | 7    | File read/write or format error                      |
//! | 8    | Mail not configured or SMTP send failed              |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map the library error to it in `CliError`'s `From` impls

use cardops_recon::ReconError;
use cardops_store::StoreError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unparseable dates, unknown `--by` mode.
pub const EXIT_USAGE: u8 = 2;

/// A dataset lacks a column the operation needs (after alias and positional fallback).
pub const EXIT_MISSING_COLUMN: u8 = 3;

/// Campaign side holds more than one gclid for a seqId.
pub const EXIT_MANY_TO_ONE: u8 = 4;

/// Query contains DROP/DELETE/UPDATE/..., or would write, and was not run.
pub const EXIT_UNSAFE_QUERY: u8 = 5;

/// SQLite rejected a statement or the table does not exist.
pub const EXIT_DATABASE: u8 = 6;

/// Input file unreadable or unsupported, output file not writable.
pub const EXIT_IO: u8 = 7;

/// Mail settings incomplete, no SMTP password, or the server refused the message.
pub const EXIT_MAIL: u8 = 8;

/// Exit code for an engine error.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::MissingColumn { .. } | ReconError::NoDateColumns { .. } => EXIT_MISSING_COLUMN,
        ReconError::ManyToOneViolation { .. } => EXIT_MANY_TO_ONE,
        ReconError::NoValidDates { .. } | ReconError::NoRecordsInRange { .. } => EXIT_ERROR,
    }
}

/// Exit code for a store error.
pub fn store_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::Database(_) | StoreError::TableNotFound { .. } => EXIT_DATABASE,
        StoreError::Io(_) => EXIT_IO,
        StoreError::MissingColumn { .. } | StoreError::NoCommonColumns { .. } => EXIT_MISSING_COLUMN,
        StoreError::UnsafeQuery { .. } | StoreError::WriteStatement => EXIT_UNSAFE_QUERY,
        StoreError::NoRows => EXIT_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_MISSING_COLUMN,
            EXIT_MANY_TO_ONE,
            EXIT_UNSAFE_QUERY,
            EXIT_DATABASE,
            EXIT_IO,
            EXIT_MAIL,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn library_errors_map_to_registry() {
        let missing = ReconError::MissingColumn { dataset: "MIS".into(), aliases: vec!["LC2_CODE".into()] };
        assert_eq!(recon_exit_code(&missing), EXIT_MISSING_COLUMN);
        let m1 = ReconError::ManyToOneViolation { key: "1001".into(), rows: 2 };
        assert_eq!(recon_exit_code(&m1), EXIT_MANY_TO_ONE);
        assert_eq!(store_exit_code(&StoreError::UnsafeQuery { keyword: "DROP".into() }), EXIT_UNSAFE_QUERY);
        assert_eq!(store_exit_code(&StoreError::database("locked")), EXIT_DATABASE);
        assert_eq!(store_exit_code(&StoreError::WriteStatement), EXIT_UNSAFE_QUERY);
        assert_eq!(store_exit_code(&StoreError::NoRows), EXIT_ERROR);
    }
}
