//! Skip-aware integration test harness.
//!
//! Cases run through a [`SkipAwareRunner`]: a session-wide [`SkipState`]
//! short-circuits cases before they start, and a body can still ask to be
//! skipped after it started by returning (or raising) a [`SkipRequested`].
//! The [`SkipInterceptor`] turns such failures into skips before the
//! aggregator sees them, and [`reconcile`] keeps the counters consistent.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod interceptor;
pub mod outcome;
pub mod runner;
pub mod session;
pub mod sink;
pub mod skip;
pub mod suite;
pub mod summary;
pub mod telemetry;

pub use context::TestContext;
pub use error::{HarnessError, Result};
pub use executor::{CaseExecutor, CaseFuture};
pub use interceptor::SkipInterceptor;
pub use outcome::{CompletionEvent, Outcome};
pub use runner::{ReclassificationTally, SkipAwareRunner};
pub use session::{Availability, Fixture, Session, SessionConfig, SessionReport};
pub use sink::{Collector, OutcomeSink};
pub use skip::{install_skip_panic_hook, SkipRequested, SkipState, TEARDOWN_REASON};
pub use suite::{CaseBody, Suite, TestCase};
pub use summary::{reconcile, RunSummary};
