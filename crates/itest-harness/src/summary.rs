//! Aggregate run counters and their post-run reconciliation.

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::Result;

/// Counters for one case, one row, or a whole session.
///
/// `passed` is implicit: `total - failed - skipped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub const fn passed_one() -> Self {
        Self {
            total: 1,
            failed: 0,
            skipped: 0,
        }
    }

    pub const fn failed_one() -> Self {
        Self {
            total: 1,
            failed: 1,
            skipped: 0,
        }
    }

    pub const fn skipped_one() -> Self {
        Self {
            total: 1,
            failed: 0,
            skipped: 1,
        }
    }

    /// Number of rows that neither failed nor were skipped.
    pub fn passed(&self) -> usize {
        self.total.saturating_sub(self.failed + self.skipped)
    }

    /// Add another summary's counters to this one.
    pub fn absorb(&mut self, other: RunSummary) {
        self.total += other.total;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Move `reclassified` outcomes from failed to skipped.
///
/// `total` is unchanged. Reclassifying more outcomes than were reported
/// failed means an event was counted twice somewhere; that is surfaced as
/// [`HarnessError::ReclassificationOverflow`] instead of being clamped.
pub fn reconcile(original: RunSummary, reclassified: usize) -> Result<RunSummary> {
    let failed = original.failed.checked_sub(reclassified).ok_or(
        HarnessError::ReclassificationOverflow {
            failed: original.failed,
            reclassified,
        },
    )?;

    Ok(RunSummary {
        total: original.total,
        failed,
        skipped: original.skipped + reclassified,
    })
}
