//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: billing scripts branch on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 60-69   | billing          | Invoice run outcomes                     |
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

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// clap exits with this code on its own parse errors.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Billing (60-69)
// =============================================================================

/// Run config could not be read, parsed or validated.
pub const EXIT_INVALID_CONFIG: u8 = 60;

/// The pipeline stopped before producing invoices: every loaded source has a
/// blank identity column, or no client has one record in every period.
/// No archive is written.
pub const EXIT_PIPELINE_FATAL: u8 = 61;

/// The run finished and the archive was written, but some clients were excluded,
/// a period failed to load, identities disagreed, or documents failed to render.
pub const EXIT_COMPLETED_WITH_ISSUES: u8 = 62;

/// Template, output or archive I/O failed. Also used when no document at all
/// could be rendered.
pub const EXIT_IO: u8 = 63;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_codes_stay_in_their_range() {
        for code in [EXIT_INVALID_CONFIG, EXIT_PIPELINE_FATAL, EXIT_COMPLETED_WITH_ISSUES, EXIT_IO] {
            assert!((60..70).contains(&code));
        }
        assert_ne!(EXIT_ERROR, EXIT_USAGE);
        assert_eq!(EXIT_SUCCESS, 0);
    }
}
