//! Per-case outcomes and the completion events that carry them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::skip::SkipRequested;

/// Classification of a single case invocation (one data row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed(String),
    Skipped(String),
}

impl Outcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    /// Short lowercase label used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed(_) => "failed",
            Outcome::Skipped(_) => "skipped",
        }
    }
}

/// One notification on the reporting channel: exactly one per case row.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionEvent {
    /// Case name.
    pub case: String,

    /// Data row index for parameterized cases.
    pub row: Option<usize>,

    pub outcome: Outcome,

    /// Present when a failure was caused by a [`SkipRequested`].
    #[serde(skip)]
    pub skip_marker: Option<SkipRequested>,

    pub duration_ms: u64,

    pub finished_at: DateTime<Utc>,
}

impl CompletionEvent {
    pub fn new(case: impl Into<String>, row: Option<usize>, outcome: Outcome) -> Self {
        Self {
            case: case.into(),
            row,
            outcome,
            skip_marker: None,
            duration_ms: 0,
            finished_at: Utc::now(),
        }
    }

    pub fn with_skip_marker(mut self, marker: SkipRequested) -> Self {
        self.skip_marker = Some(marker);
        self
    }

    pub fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration_ms = elapsed.as_millis() as u64;
        self
    }

    /// `case` or `case[row]`.
    pub fn label(&self) -> String {
        match self.row {
            Some(row) => format!("{}[{}]", self.case, row),
            None => self.case.clone(),
        }
    }
}
