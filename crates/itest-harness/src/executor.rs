//! Case execution: runs one body and reports exactly one outcome.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::outcome::{CompletionEvent, Outcome};
use crate::sink::OutcomeSink;
use crate::skip::SkipRequested;
use crate::summary::RunSummary;

/// Future produced by a case body.
pub type CaseFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Runs case bodies with a panic guard and an optional timeout.
#[derive(Debug, Clone, Default)]
pub struct CaseExecutor {
    timeout: Option<Duration>,
}

impl CaseExecutor {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Execute a body and emit its raw outcome to `sink`.
    ///
    /// - `Ok(())` is `Passed`
    /// - an error is `Failed`, marked when the error chain holds a
    ///   [`SkipRequested`]
    /// - a panic is `Failed`, marked when the payload is a [`SkipRequested`]
    /// - running past the timeout is `Failed`
    ///
    /// Returns the raw (unreconciled) summary for the single invocation.
    pub async fn execute(
        &self,
        case: &str,
        row: Option<usize>,
        body: CaseFuture,
        sink: &dyn OutcomeSink,
    ) -> RunSummary {
        let start = Instant::now();
        let guarded = AssertUnwindSafe(body).catch_unwind();

        let finished = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, guarded).await.ok(),
            None => Some(guarded.await),
        };

        let (outcome, marker) = match finished {
            None => (
                Outcome::Failed(format!(
                    "timed out after {}s",
                    self.timeout.unwrap_or_default().as_secs()
                )),
                None,
            ),
            Some(Ok(Ok(()))) => (Outcome::Passed, None),
            Some(Ok(Err(error))) => (
                Outcome::Failed(format!("{error:#}")),
                skip_marker_in_error(&error),
            ),
            Some(Err(payload)) => (
                Outcome::Failed(panic_message(payload.as_ref())),
                payload.downcast_ref::<SkipRequested>().cloned(),
            ),
        };

        let summary = if outcome.is_failed() {
            RunSummary::failed_one()
        } else {
            RunSummary::passed_one()
        };

        let mut event = CompletionEvent::new(case, row, outcome).with_duration(start.elapsed());
        if let Some(marker) = marker {
            event = event.with_skip_marker(marker);
        }
        sink.emit(event);

        summary
    }
}

fn skip_marker_in_error(error: &anyhow::Error) -> Option<SkipRequested> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<SkipRequested>())
        .cloned()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(skip) = payload.downcast_ref::<SkipRequested>() {
        skip.to_string()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked with a non-string payload".to_string()
    }
}
