//! Error types for the skip-aware harness

use thiserror::Error;

/// Errors raised by the harness itself (never by a case body).
#[derive(Error, Debug)]
pub enum HarnessError {
    /// More events were reclassified as skipped than were reported failed.
    #[error("reclassified {reclassified} outcome(s) but only {failed} were reported failed")]
    ReclassificationOverflow { failed: usize, reclassified: usize },

    /// A case task was lost outside the executor's panic guard.
    #[error("case task '{case}' did not complete: {reason}")]
    CaseTask { case: String, reason: String },
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;
