//! Per-invocation context handed to every case body.

use std::sync::Arc;

use tracing::debug;

use crate::skip::{SkipRequested, SkipState};

/// What a running case body can see: its identity, the session resource
/// (only once the fixture is ready) and the dynamic skip signal.
pub struct TestContext<R> {
    case: String,
    row: Option<usize>,
    resource: Option<Arc<R>>,
    skip: Arc<SkipState>,
}

impl<R> Clone for TestContext<R> {
    fn clone(&self) -> Self {
        Self {
            case: self.case.clone(),
            row: self.row,
            resource: self.resource.clone(),
            skip: Arc::clone(&self.skip),
        }
    }
}

impl<R> TestContext<R> {
    pub fn new(
        case: impl Into<String>,
        row: Option<usize>,
        resource: Option<Arc<R>>,
        skip: Arc<SkipState>,
    ) -> Self {
        Self {
            case: case.into(),
            row,
            resource,
            skip,
        }
    }

    pub fn case(&self) -> &str {
        &self.case
    }

    pub fn row(&self) -> Option<usize> {
        self.row
    }

    pub fn skip_state(&self) -> &SkipState {
        &self.skip
    }

    /// The session resource, or a skip request when the fixture never
    /// became ready.
    pub fn resource(&self) -> Result<Arc<R>, SkipRequested> {
        self.resource.clone().ok_or_else(|| {
            self.request_skip(
                self.skip
                    .reason()
                    .unwrap_or("session resource is not available"),
            )
        })
    }

    /// Ask for this invocation to be reported as skipped.
    ///
    /// Return the value as the body's error (or `raise()` it); the body
    /// should not continue past this call.
    pub fn request_skip(&self, reason: impl Into<String>) -> SkipRequested {
        let request = SkipRequested::new(reason);
        debug!(case = %self.case, row = ?self.row, reason = request.reason(), "Skip requested");
        request
    }

    pub fn skip_if(&self, condition: bool, reason: impl Into<String>) -> Result<(), SkipRequested> {
        if condition {
            Err(self.request_skip(reason))
        } else {
            Ok(())
        }
    }

    pub fn skip_unless(
        &self,
        condition: bool,
        reason: impl Into<String>,
    ) -> Result<(), SkipRequested> {
        self.skip_if(!condition, reason)
    }
}
