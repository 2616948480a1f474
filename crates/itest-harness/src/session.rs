//! Session orchestration: one fixture, one skip state, many cases.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{env_flag, env_secs};
use crate::executor::CaseExecutor;
use crate::outcome::CompletionEvent;
use crate::runner::SkipAwareRunner;
use crate::sink::{Collector, OutcomeSink};
use crate::skip::{install_skip_panic_hook, SkipState};
use crate::suite::Suite;
use crate::summary::RunSummary;
use crate::{HarnessError, Result};

/// What a fixture hands to the session once it has been asked for its
/// resource.
#[derive(Debug)]
pub enum Availability<R> {
    Ready(Arc<R>),
    Unavailable(String),
}

impl<R> Clone for Availability<R> {
    fn clone(&self) -> Self {
        match self {
            Availability::Ready(resource) => Availability::Ready(Arc::clone(resource)),
            Availability::Unavailable(reason) => Availability::Unavailable(reason.clone()),
        }
    }
}

impl<R> Availability<R> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Availability::Ready(_))
    }
}

/// Session-scoped external resource.
///
/// `acquire` is called once before any case runs, `release` once after the
/// last case finished.
#[async_trait]
pub trait Fixture: Send + Sync {
    type Resource: Send + Sync + 'static;

    async fn acquire(&self) -> Availability<Self::Resource>;

    async fn release(&self) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: Fixture + ?Sized> Fixture for Arc<T> {
    type Resource = T::Resource;

    async fn acquire(&self) -> Availability<Self::Resource> {
        (**self).acquire().await
    }

    async fn release(&self) -> anyhow::Result<()> {
        (**self).release().await
    }
}

/// Session knobs read from the environment.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Per-row limit; `None` lets bodies run unbounded.
    pub case_timeout: Option<Duration>,
    pub json_logs: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            case_timeout: Some(Duration::from_secs(120)),
            json_logs: false,
        }
    }
}

impl SessionConfig {
    /// `ITEST_CASE_TIMEOUT_SECS` (0 disables the limit) and `ITEST_LOG_JSON`.
    pub fn from_env() -> Self {
        let default = Self::default();
        let secs = env_secs(
            "ITEST_CASE_TIMEOUT_SECS",
            default.case_timeout.unwrap_or_default(),
        );
        Self {
            case_timeout: (!secs.is_zero()).then_some(secs),
            json_logs: env_flag("ITEST_LOG_JSON"),
        }
    }

    pub fn with_case_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.case_timeout = timeout;
        self
    }

    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Final account of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub suite: String,
    pub summary: RunSummary,
    pub reclassified: usize,
    pub skip_reason: Option<String>,
    pub events: Vec<CompletionEvent>,
    pub duplicate_events: usize,
    pub release_error: Option<String>,
    pub duration_ms: u64,
}

impl SessionReport {
    /// No failed case and nothing went wrong around the cases.
    pub fn success(&self) -> bool {
        self.summary.failed == 0 && self.duplicate_events == 0 && self.release_error.is_none()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// One line in the shape of the standard test harness result line.
    pub fn render(&self) -> String {
        format!(
            "test result: {}. {} passed; {} failed; {} skipped; finished in {:.2}s",
            if self.success() { "ok" } else { "FAILED" },
            self.summary.passed(),
            self.summary.failed,
            self.summary.skipped,
            self.duration_ms as f64 / 1000.0
        )
    }
}

/// Drives a [`Suite`] against one [`Fixture`].
pub struct Session<X: Fixture> {
    id: Uuid,
    fixture: X,
    config: SessionConfig,
    skip: Arc<SkipState>,
}

impl<X: Fixture> Session<X> {
    pub fn new(fixture: X, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            fixture,
            config,
            skip: Arc::new(SkipState::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn skip_state(&self) -> &Arc<SkipState> {
        &self.skip
    }

    pub fn fixture(&self) -> &X {
        &self.fixture
    }

    /// Acquire, run every stage, close, release, report.
    ///
    /// Release runs even when a case task was lost; that loss is then
    /// returned as the error.
    pub async fn run(&self, suite: &Suite<X::Resource>) -> Result<SessionReport> {
        install_skip_panic_hook();
        let started = Instant::now();
        info!(
            session_id = %self.id,
            suite = suite.name(),
            cases = suite.case_count(),
            "Starting session"
        );

        let acquired = !suite.is_empty();
        let resource = if acquired {
            match self.fixture.acquire().await {
                Availability::Ready(resource) => Some(resource),
                Availability::Unavailable(reason) => {
                    self.skip.skip_all(reason);
                    None
                }
            }
        } else {
            None
        };

        let runner = Arc::new(SkipAwareRunner::new(
            Arc::clone(&self.skip),
            CaseExecutor::new(self.config.case_timeout),
        ));
        let collector = Arc::new(Collector::new());

        let mut summary = RunSummary::default();
        let mut lost = None;
        for (index, stage) in suite.stages().iter().enumerate() {
            info!(stage = index + 1, cases = stage.len(), "Running stage");

            let handles: Vec<_> = stage
                .iter()
                .map(|case| {
                    let runner = Arc::clone(&runner);
                    let sink: Arc<dyn OutcomeSink> = collector.clone();
                    let case = Arc::clone(case);
                    let resource = resource.clone();
                    let name = case.name().to_string();
                    let handle = tokio::spawn(async move {
                        runner.run_case(&case, resource, sink.as_ref()).await
                    });
                    (name, handle)
                })
                .collect();

            for (name, handle) in handles {
                match handle.await {
                    Ok(Ok(case_summary)) => summary.absorb(case_summary),
                    Ok(Err(err)) => {
                        error!(case = %name, error = %err, "Case could not be reconciled");
                        lost.get_or_insert(err);
                    }
                    Err(join) => {
                        error!(case = %name, error = %join, "Case task did not complete");
                        lost.get_or_insert(HarnessError::CaseTask {
                            case: name,
                            reason: join.to_string(),
                        });
                    }
                }
            }
        }

        self.skip.close();

        let release_error = if acquired {
            match self.fixture.release().await {
                Ok(()) => None,
                Err(err) => {
                    error!(error = %format!("{err:#}"), "Fixture release failed");
                    Some(format!("{err:#}"))
                }
            }
        } else {
            None
        };

        if let Some(err) = lost {
            return Err(err);
        }

        let duplicate_events = collector.duplicates();
        if duplicate_events > 0 {
            warn!(duplicate_events, "Aggregator saw duplicate case outcomes");
        }

        let report = SessionReport {
            session_id: self.id,
            suite: suite.name().to_string(),
            summary,
            reclassified: runner.tally().total(),
            skip_reason: self.initial_skip_reason(),
            events: collector.events(),
            duplicate_events,
            release_error,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            session_id = %self.id,
            passed = report.summary.passed(),
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            reclassified = report.reclassified,
            "Session finished"
        );
        Ok(report)
    }

    /// The reason set before any case ran, if any; the teardown reason is
    /// not interesting in a report.
    fn initial_skip_reason(&self) -> Option<String> {
        self.skip
            .reason()
            .filter(|reason| *reason != crate::skip::TEARDOWN_REASON)
            .map(str::to_owned)
    }
}
