//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain      | Description                              |
//! |---------|-------------|------------------------------------------|
//! | 0       | Universal   | Success                                  |
//! | 1       | Universal   | General error (unspecified)              |
//! | 2       | Universal   | CLI usage error (bad args, missing file) |
//! | 3-9     | Universal   | File I/O and parse errors                |
//! | 10-19   | apply       | Command batch application                |
//! | 20-29   | backend     | Persistence backend and AI connection    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use sheetpilot_hub_client::HubError;
use sheetpilot_sync::SyncError;

// =============================================================================
// Universal (0-9)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// File could not be read or written.
pub const EXIT_IO: u8 = 3;

/// Input file is not a valid snapshot or command batch.
pub const EXIT_PARSE: u8 = 4;

// =============================================================================
// Apply (10-19)
// =============================================================================

/// Some commands in the batch were skipped (unknown sheet, invalid range,
/// malformed command). The rest were applied and the output was written.
pub const EXIT_APPLY_PARTIAL: u8 = 10;

// =============================================================================
// Backend (20-29)
// =============================================================================

/// Backend unreachable, or an action needed the AI connection and it is down.
pub const EXIT_BACKEND_NETWORK: u8 = 20;

/// check-and-load failed or returned a document that cannot be read.
pub const EXIT_BACKEND_LOAD: u8 = 21;

/// Save or rename rejected or failed. Local changes are kept.
pub const EXIT_BACKEND_PERSISTENCE: u8 = 22;

/// The server holds a newer lock version than this client observed.
pub const EXIT_BACKEND_CONFLICT: u8 = 23;

/// Rollback rejected or its snapshot unreadable. Nothing was changed.
pub const EXIT_BACKEND_ROLLBACK: u8 = 24;

/// No saved credentials and no token given.
pub const EXIT_BACKEND_NOT_AUTH: u8 = 25;

/// Map a sync error to its exit code.
pub fn sync_exit_code(err: &SyncError) -> u8 {
    match err {
        SyncError::NotConnected | SyncError::Transport(_) => EXIT_BACKEND_NETWORK,
        SyncError::Load(_) => EXIT_BACKEND_LOAD,
        SyncError::PersistenceFailure(_) => EXIT_BACKEND_PERSISTENCE,
        SyncError::StaleVersionConflict { .. } => EXIT_BACKEND_CONFLICT,
        SyncError::RollbackFailure(_) => EXIT_BACKEND_ROLLBACK,
        SyncError::Chat(_) => EXIT_ERROR,
    }
}

/// Map a hub client error (raised before a session exists) to its exit code.
pub fn hub_exit_code(err: &HubError) -> u8 {
    match err {
        HubError::NotAuthenticated => EXIT_BACKEND_NOT_AUTH,
        HubError::Network(_) | HubError::Timeout(_) => EXIT_BACKEND_NETWORK,
        HubError::Conflict { .. } => EXIT_BACKEND_CONFLICT,
        _ => EXIT_ERROR,
    }
}
