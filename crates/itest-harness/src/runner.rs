//! Skip-aware case runner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::context::TestContext;
use crate::executor::CaseExecutor;
use crate::interceptor::SkipInterceptor;
use crate::outcome::{CompletionEvent, Outcome};
use crate::sink::OutcomeSink;
use crate::skip::{SkipState, TEARDOWN_REASON};
use crate::suite::{CaseBody, TestCase};
use crate::summary::{reconcile, RunSummary};
use crate::Result;

/// Session-wide count of failures reclassified as skips.
#[derive(Debug, Default)]
pub struct ReclassificationTally(AtomicUsize);

impl ReclassificationTally {
    pub fn add(&self, count: usize) {
        self.0.fetch_add(count, Ordering::AcqRel);
    }

    pub fn total(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// Entry point used in place of a plain case invocation.
///
/// Per row:
/// 1. if the session says skip, report `Skipped` without touching the body
/// 2. otherwise run the body through a fresh [`SkipInterceptor`]
/// 3. reconcile the raw summary with that interceptor's count
pub struct SkipAwareRunner {
    skip: Arc<SkipState>,
    executor: CaseExecutor,
    tally: Arc<ReclassificationTally>,
}

impl SkipAwareRunner {
    pub fn new(skip: Arc<SkipState>, executor: CaseExecutor) -> Self {
        Self {
            skip,
            executor,
            tally: Arc::new(ReclassificationTally::default()),
        }
    }

    pub fn skip_state(&self) -> &Arc<SkipState> {
        &self.skip
    }

    pub fn tally(&self) -> &Arc<ReclassificationTally> {
        &self.tally
    }

    /// Run every row of `case`, reporting one event per row to `sink`.
    pub async fn run_case<R: Send + Sync + 'static>(
        &self,
        case: &TestCase<R>,
        resource: Option<Arc<R>>,
        sink: &dyn OutcomeSink,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for (index, body) in case.rows().iter().enumerate() {
            let row = case.is_theory().then_some(index);
            let row_summary = self
                .run_row(case.name(), row, body, resource.clone(), sink)
                .await?;
            summary.absorb(row_summary);
        }
        Ok(summary)
    }

    async fn run_row<R: Send + Sync + 'static>(
        &self,
        case: &str,
        row: Option<usize>,
        body: &CaseBody<R>,
        resource: Option<Arc<R>>,
        sink: &dyn OutcomeSink,
    ) -> Result<RunSummary> {
        if self.skip.should_skip_before_start() {
            let reason = self.skip.reason().unwrap_or(TEARDOWN_REASON).to_string();
            sink.emit(CompletionEvent::new(case, row, Outcome::Skipped(reason)));
            return Ok(RunSummary::skipped_one());
        }

        let interceptor = SkipInterceptor::new(sink);
        let ctx = TestContext::new(case, row, resource, Arc::clone(&self.skip));
        let raw = self.executor.execute(case, row, body(ctx), &interceptor).await;

        let reclassified = interceptor.reclassified();
        if reclassified > 0 {
            debug!(case, ?row, reclassified, "Reconciling reclassified outcomes");
        }
        self.tally.add(reclassified);
        reconcile(raw, reclassified)
    }
}
