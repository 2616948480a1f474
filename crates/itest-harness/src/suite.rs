//! Case definitions and their grouping into ordered stages.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;

use crate::context::TestContext;
use crate::executor::CaseFuture;

/// One invocable body; parameterized cases hold one per data row.
pub type CaseBody<R> = Arc<dyn Fn(TestContext<R>) -> CaseFuture + Send + Sync>;

/// A single case (`fact`) or a parameterized case (`theory`).
pub struct TestCase<R> {
    name: String,
    rows: Vec<CaseBody<R>>,
    theory: bool,
}

impl<R: Send + Sync + 'static> TestCase<R> {
    /// A case with a single invocation.
    pub fn fact<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(TestContext<R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let body: CaseBody<R> = Arc::new(move |ctx: TestContext<R>| body(ctx).boxed());
        Self {
            name: name.into(),
            rows: vec![body],
            theory: false,
        }
    }

    /// A data-driven case: `body` is invoked once per row.
    pub fn theory<T, I, F, Fut>(name: impl Into<String>, rows: I, body: F) -> Self
    where
        T: Clone + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
        F: Fn(TestContext<R>, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let body = Arc::new(body);
        let rows = rows
            .into_iter()
            .map(|row| {
                let body = Arc::clone(&body);
                Arc::new(move |ctx: TestContext<R>| body(ctx, row.clone()).boxed()) as CaseBody<R>
            })
            .collect();

        Self {
            name: name.into(),
            rows,
            theory: true,
        }
    }
}

impl<R> TestCase<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_theory(&self) -> bool {
        self.theory
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn rows(&self) -> &[CaseBody<R>] {
        &self.rows
    }
}

/// Ordered stages of cases.
///
/// Cases inside a stage run concurrently; a stage starts only after the
/// previous one finished.
pub struct Suite<R> {
    name: String,
    stages: Vec<Vec<Arc<TestCase<R>>>>,
}

impl<R> Suite<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Append a stage.
    pub fn stage(mut self, cases: impl IntoIterator<Item = TestCase<R>>) -> Self {
        let stage: Vec<_> = cases.into_iter().map(Arc::new).collect();
        if !stage.is_empty() {
            self.stages.push(stage);
        }
        self
    }

    /// Keep only cases whose name contains `filter`; empty stages are dropped.
    pub fn filtered(self, filter: &str) -> Self {
        self.retain_cases(|name| name.contains(filter))
    }

    /// Drop every case whose name contains `pattern`.
    pub fn excluding(self, pattern: &str) -> Self {
        self.retain_cases(|name| !name.contains(pattern))
    }

    /// Keep the cases whose name satisfies `keep`, preserving stage order.
    /// Stages left empty are removed.
    pub fn retain_cases(mut self, mut keep: impl FnMut(&str) -> bool) -> Self {
        for stage in &mut self.stages {
            stage.retain(|case| keep(case.name()));
        }
        self.stages.retain(|stage| !stage.is_empty());
        self
    }

    /// Case names in execution order.
    pub fn case_names(&self) -> Vec<&str> {
        self.stages.iter().flatten().map(|case| case.name()).collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Vec<Arc<TestCase<R>>>] {
        &self.stages
    }

    pub fn case_count(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> TestCase<()> {
        TestCase::fact(name, |_ctx| async { Ok(()) })
    }

    #[test]
    fn test_fact_has_one_row() {
        let case = noop("connect");
        assert_eq!(case.name(), "connect");
        assert_eq!(case.row_count(), 1);
        assert!(!case.is_theory());
    }

    #[test]
    fn test_theory_has_row_per_datum() {
        let case: TestCase<()> =
            TestCase::theory("sizes", [0usize, 13, 256], |_ctx, _size| async { Ok(()) });
        assert_eq!(case.row_count(), 3);
        assert!(case.is_theory());
    }

    #[test]
    fn test_empty_stage_is_ignored() {
        let suite: Suite<()> = Suite::new("ftp").stage(Vec::new()).stage([noop("a")]);
        assert_eq!(suite.stages().len(), 1);
        assert_eq!(suite.case_count(), 1);
    }

    #[test]
    fn test_filter_drops_empty_stages() {
        let suite = Suite::new("ftp")
            .stage([noop("connect_and_list")])
            .stage([noop("upload")])
            .stage([noop("connect"), noop("upload_download_bytes")])
            .filtered("upload");

        assert_eq!(suite.stages().len(), 2);
        assert_eq!(suite.case_count(), 2);
        assert_eq!(suite.case_names(), vec!["upload", "upload_download_bytes"]);
    }

    #[test]
    fn test_excluding_removes_matches_only() {
        let suite = Suite::new("ftp")
            .stage([noop("connect_and_list")])
            .stage([noop("upload")])
            .stage([noop("connect"), noop("upload_download_bytes")])
            .excluding("upload");

        assert_eq!(suite.stages().len(), 2);
        assert_eq!(suite.case_names(), vec!["connect_and_list", "connect"]);
    }

    #[test]
    fn test_retain_cases_by_exact_name() {
        let suite = Suite::new("ftp")
            .stage([noop("connect_and_list")])
            .stage([noop("connect"), noop("upload")])
            .retain_cases(|name| name == "connect");

        assert_eq!(suite.stages().len(), 1);
        assert_eq!(suite.case_names(), vec!["connect"]);
    }
}
