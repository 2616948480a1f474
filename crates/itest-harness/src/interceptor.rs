//! Result interceptor: turns skip-marked failures into skips in flight.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::outcome::{CompletionEvent, Outcome};
use crate::sink::OutcomeSink;

/// Decorator over an [`OutcomeSink`].
///
/// A `Failed` event that carries a skip marker is replaced by a `Skipped`
/// event with the marker's reason and counted. Everything else is forwarded
/// untouched. Each received event produces exactly one forwarded event.
#[derive(Debug)]
pub struct SkipInterceptor<S> {
    inner: S,
    reclassified: AtomicUsize,
}

impl<S: OutcomeSink> SkipInterceptor<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reclassified: AtomicUsize::new(0),
        }
    }

    /// Number of failures converted to skips so far.
    pub fn reclassified(&self) -> usize {
        self.reclassified.load(Ordering::Acquire)
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: OutcomeSink> OutcomeSink for SkipInterceptor<S> {
    fn emit(&self, event: CompletionEvent) {
        let skip_reason = match (&event.outcome, &event.skip_marker) {
            (Outcome::Failed(_), Some(marker)) => Some(marker.reason().to_owned()),
            _ => None,
        };

        let event = match skip_reason {
            Some(reason) => {
                self.reclassified.fetch_add(1, Ordering::AcqRel);
                debug!(case = %event.label(), %reason, "Reclassifying failure as skip");
                CompletionEvent {
                    outcome: Outcome::Skipped(reason),
                    ..event
                }
            }
            None => event,
        };

        self.inner.emit(event);
    }
}
