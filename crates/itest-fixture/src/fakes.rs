//! In-memory container runtime (testing only)
//!
//! [`RecordingRuntime`] satisfies [`ContainerRuntime`] without touching a
//! container engine: it records every call, hands out sequential ids and can
//! be told to fail one step.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FixtureError, Result};
use crate::runtime::{ContainerId, ContainerRuntime};
use crate::spec::ServiceSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    RemoveStale(String),
    /// Container name of the created spec.
    Create(String),
    Start(ContainerId),
    Remove(ContainerId),
}

/// Step that should return an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Create,
    Start,
    Remove,
}

#[derive(Debug, Default)]
pub struct RecordingRuntime {
    calls: Mutex<Vec<RuntimeCall>>,
    fail: Option<FailPoint>,
    create_delay: Duration,
    next_id: AtomicUsize,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(point: FailPoint) -> Self {
        Self {
            fail: Some(point),
            ..Self::default()
        }
    }

    /// Make `create` take a while, to widen race windows.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn creates(&self) -> usize {
        self.count(|call| matches!(call, RuntimeCall::Create(_)))
    }

    pub fn removes(&self) -> usize {
        self.count(|call| matches!(call, RuntimeCall::Remove(_)))
    }

    fn count(&self, predicate: impl Fn(&RuntimeCall) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: RuntimeCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail == Some(point) {
            return Err(FixtureError::CommandFailed {
                command: format!("fake {point:?}").to_lowercase(),
                code: 1,
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn create(&self, spec: &ServiceSpec) -> Result<ContainerId> {
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        self.record(RuntimeCall::Create(spec.container_name().to_string()));
        self.check(FailPoint::Create)?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(ContainerId::new(format!("fake-{n}")))
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        self.record(RuntimeCall::Start(id.clone()));
        self.check(FailPoint::Start)
    }

    async fn remove(&self, id: &ContainerId) -> Result<()> {
        self.record(RuntimeCall::Remove(id.clone()));
        self.check(FailPoint::Remove)
    }

    async fn remove_stale(&self, name: &str) -> Result<()> {
        self.record(RuntimeCall::RemoveStale(name.to_string()));
        Ok(())
    }
}
