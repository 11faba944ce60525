//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; schedulers and cron wrappers
//! rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success (per-shipment errors included)   |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args)               |
//! | 3       | config           | Settings file or credentials invalid     |
//! | 60-69   | pipeline         | Spreadsheet, messaging and lookup codes  |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - the pass completed. Shipments that failed lookup are reported,
/// not fatal.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown carrier name.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Config (3)
// =============================================================================

/// Settings file unreadable or invalid, no sheet tokens, or Lark app
/// credentials missing.
pub const EXIT_CONFIG: u8 = 3;

// =============================================================================
// Pipeline (60-69)
// =============================================================================

/// No configured spreadsheet could be read.
pub const EXIT_SHEET_UNAVAILABLE: u8 = 60;

/// The summary message could not be delivered.
pub const EXIT_DELIVERY_FAILED: u8 = 61;

/// Lark rejected the app credentials.
pub const EXIT_LARK_AUTH: u8 = 62;

/// `track`: the single lookup failed.
pub const EXIT_TRACK_FAILED: u8 = 63;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_CONFIG,
            EXIT_SHEET_UNAVAILABLE,
            EXIT_DELIVERY_FAILED,
            EXIT_LARK_AUTH,
            EXIT_TRACK_FAILED,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
