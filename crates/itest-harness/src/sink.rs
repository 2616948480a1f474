//! The reporting channel between case execution and the aggregator.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info, warn};

use crate::outcome::{CompletionEvent, Outcome};
use crate::summary::RunSummary;

/// Receives one [`CompletionEvent`] per finished case row.
pub trait OutcomeSink: Send + Sync {
    fn emit(&self, event: CompletionEvent);
}

impl<T: OutcomeSink + ?Sized> OutcomeSink for Arc<T> {
    fn emit(&self, event: CompletionEvent) {
        (**self).emit(event)
    }
}

impl<T: OutcomeSink + ?Sized> OutcomeSink for &T {
    fn emit(&self, event: CompletionEvent) {
        (**self).emit(event)
    }
}

#[derive(Debug, Default)]
struct CollectorState {
    events: Vec<CompletionEvent>,
    seen: HashSet<(String, Option<usize>)>,
    duplicates: usize,
}

/// Session aggregator: logs and keeps every event it receives.
///
/// A second event for the same case row is kept but counted as a duplicate
/// so the report can flag it.
#[derive(Debug, Default)]
pub struct Collector {
    state: Mutex<CollectorState>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CompletionEvent> {
        self.lock().events.clone()
    }

    pub fn duplicates(&self) -> usize {
        self.lock().duplicates
    }

    /// Counters derived from the received events.
    pub fn summary(&self) -> RunSummary {
        let state = self.lock();
        let mut summary = RunSummary::default();
        for event in &state.events {
            summary.absorb(match event.outcome {
                Outcome::Passed => RunSummary::passed_one(),
                Outcome::Failed(_) => RunSummary::failed_one(),
                Outcome::Skipped(_) => RunSummary::skipped_one(),
            });
        }
        summary
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutcomeSink for Collector {
    fn emit(&self, event: CompletionEvent) {
        let label = event.label();
        match &event.outcome {
            Outcome::Passed => info!(case = %label, duration_ms = event.duration_ms, "Case passed"),
            Outcome::Failed(detail) => error!(case = %label, %detail, "Case failed"),
            Outcome::Skipped(reason) => warn!(case = %label, %reason, "Case skipped"),
        }

        let mut state = self.lock();
        if !state.seen.insert((event.case.clone(), event.row)) {
            state.duplicates += 1;
            warn!(case = %label, "Duplicate outcome reported for case");
        }
        state.events.push(event);
    }
}
