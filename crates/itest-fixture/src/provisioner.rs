//! Environment provisioner: one containerized service per session.
//!
//! ```text
//! Unprovisioned -> Building -> Starting -> Ready -> Disposing -> Disposed
//!       |              \           /
//!       v               -> Failed -
//!  Unavailable
//! ```
//!
//! `Unavailable` is terminal: nothing was built, so teardown leaves it as
//! is. Every other state passes through `Disposing` to `Disposed`.
//!
//! Every transition happens under one async mutex, so concurrent first
//! callers of [`Provisioner::provision`] share a single build. The outcome
//! (ready or not) is cached for the rest of the session; a failed build is
//! never retried.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itest_harness::{Availability, Fixture};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{FixtureConfig, SERVER_KEY_ENV};
use crate::error::Result;
use crate::readiness;
use crate::runtime::{ContainerId, ContainerRuntime, DockerCli};
use crate::spec::{Credentials, ServiceKind, ServiceSpec};

/// Reason handed out once the provisioner has been torn down.
pub const DISPOSED_REASON: &str = "the FTP service has been disposed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    Unprovisioned,
    Unavailable,
    Building,
    Starting,
    Ready,
    Failed,
    Disposing,
    Disposed,
}

/// Where a provisioned service can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Transition history, shared by a provisioner and the instance it hands out.
#[derive(Debug, Clone)]
struct StateLog(Arc<Mutex<Vec<ProvisionState>>>);

impl StateLog {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(vec![ProvisionState::Unprovisioned])))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ProvisionState>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> ProvisionState {
        self.lock()
            .last()
            .copied()
            .unwrap_or(ProvisionState::Unprovisioned)
    }
}

/// A running, ready service shared read-only with every case.
#[derive(Debug, Clone)]
pub struct ServiceInstance {
    container: ContainerId,
    state: StateLog,
    kind: ServiceKind,
    endpoint: Endpoint,
    credentials: Credentials,
    ready_at: DateTime<Utc>,
}

impl ServiceInstance {
    pub fn container(&self) -> &ContainerId {
        &self.container
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn ready_at(&self) -> DateTime<Utc> {
        self.ready_at
    }

    /// Lifecycle state of the provisioner that owns this instance: `Ready`
    /// while cases run, `Disposing`/`Disposed` once teardown starts.
    pub fn state(&self) -> ProvisionState {
        self.state.current()
    }
}

/// Maps the configured key to a spec; `None` means unavailable.
pub type SpecResolver =
    Arc<dyn Fn(Option<&str>, &Credentials) -> Option<ServiceSpec> + Send + Sync>;

#[derive(Default)]
struct Lifecycle {
    outcome: Option<Availability<ServiceInstance>>,
    container: Option<ContainerId>,
    /// Set before `create`, so a container whose id never came back can
    /// still be removed by name.
    container_name: Option<String>,
    disposed: bool,
}

pub struct Provisioner {
    config: FixtureConfig,
    runtime: Arc<dyn ContainerRuntime>,
    resolver: SpecResolver,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    history: StateLog,
}

impl Provisioner {
    pub fn new(config: FixtureConfig, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            config,
            runtime,
            resolver: Arc::new(ServiceSpec::resolve),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::default()),
            history: StateLog::new(),
        }
    }

    /// Environment-driven config with the Docker CLI runtime.
    pub fn from_env() -> Self {
        let config = FixtureConfig::from_env();
        let runtime = Arc::new(DockerCli::new(
            config.docker_binary.clone(),
            config.docker_timeout,
        ));
        Self::new(config, runtime)
    }

    /// Replace the catalog lookup.
    pub fn with_resolver(mut self, resolver: SpecResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    pub fn state(&self) -> ProvisionState {
        self.history.current()
    }

    /// Every state entered so far, oldest first.
    pub fn transitions(&self) -> Vec<ProvisionState> {
        self.history.lock().clone()
    }

    /// The ready instance, if provisioning got there and teardown has not
    /// started.
    pub async fn instance(&self) -> Option<Arc<ServiceInstance>> {
        match &self.lifecycle.lock().await.outcome {
            Some(Availability::Ready(instance)) => Some(Arc::clone(instance)),
            _ => None,
        }
    }

    /// Bring the service up once; every caller observes the same outcome.
    pub async fn provision(&self) -> Availability<ServiceInstance> {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Some(outcome) = &lifecycle.outcome {
            return outcome.clone();
        }

        let outcome = self.build(&mut lifecycle).await;
        lifecycle.outcome = Some(outcome.clone());
        outcome
    }

    /// Release whatever was created. Only the first call does anything.
    pub async fn dispose(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.disposed {
            debug!("Provisioner already disposed");
            return Ok(());
        }
        lifecycle.disposed = true;
        lifecycle.outcome = Some(Availability::Unavailable(DISPOSED_REASON.to_string()));

        if self.state() == ProvisionState::Unavailable {
            debug!("Nothing was provisioned, nothing to dispose");
            return Ok(());
        }

        self.enter(ProvisionState::Disposing);
        let result = match (lifecycle.container.take(), lifecycle.container_name.take()) {
            (Some(id), _) => {
                info!(container = %id, "Removing container");
                self.runtime.remove(&id).await
            }
            (None, Some(name)) => {
                info!(%name, "No container id was returned, removing by name");
                self.runtime.remove_stale(&name).await
            }
            (None, None) => Ok(()),
        };
        if let Err(err) = &result {
            warn!(error = %err, "Container removal failed");
        }
        self.enter(ProvisionState::Disposed);
        result
    }

    async fn build(&self, lifecycle: &mut Lifecycle) -> Availability<ServiceInstance> {
        let key = self.config.server_key.as_deref();
        let Some(spec) = (self.resolver)(key, &self.config.credentials) else {
            let reason = match key {
                None => format!("{SERVER_KEY_ENV} is not set"),
                Some(key) => format!(
                    "{SERVER_KEY_ENV}={key} is not a known server (expected one of: {})",
                    ServiceKind::known_keys()
                ),
            };
            self.enter(ProvisionState::Unavailable);
            info!(%reason, "FTP service unavailable");
            return Availability::Unavailable(reason);
        };

        self.enter(ProvisionState::Building);
        match self.start_service(&spec, lifecycle).await {
            Ok(instance) => {
                self.enter(ProvisionState::Ready);
                info!(
                    kind = %instance.kind(),
                    endpoint = %instance.endpoint(),
                    container = %instance.container(),
                    "FTP service ready"
                );
                Availability::Ready(Arc::new(instance))
            }
            Err(err) => {
                self.enter(ProvisionState::Failed);
                error!(kind = %spec.kind(), error = %err, "FTP service provisioning failed");
                Availability::Unavailable(format!("{} provisioning failed: {err}", spec.kind()))
            }
        }
    }

    async fn start_service(
        &self,
        spec: &ServiceSpec,
        lifecycle: &mut Lifecycle,
    ) -> Result<ServiceInstance> {
        if let Err(err) = self.runtime.remove_stale(spec.container_name()).await {
            debug!(name = spec.container_name(), error = %err, "No stale container removed");
        }

        info!(image = spec.image(), name = spec.container_name(), "Creating container");
        lifecycle.container_name = Some(spec.container_name().to_string());
        let container = self.runtime.create(spec).await?;
        lifecycle.container = Some(container.clone());

        self.enter(ProvisionState::Starting);
        self.runtime.start(&container).await?;

        readiness::wait_until_ready(
            &self.config.host,
            spec.readiness(),
            self.config.readiness_timeout,
            self.config.poll_interval,
        )
        .await?;

        Ok(ServiceInstance {
            container,
            state: self.history.clone(),
            kind: spec.kind(),
            endpoint: Endpoint {
                host: self.config.host.clone(),
                port: spec.primary_port(),
            },
            credentials: spec.credentials().clone(),
            ready_at: Utc::now(),
        })
    }

    fn enter(&self, next: ProvisionState) {
        let mut history = self.history.lock();
        let from = history.last().copied();
        history.push(next);
        info!(?from, to = ?next, "Provisioner transition");
    }
}

#[async_trait]
impl Fixture for Provisioner {
    type Resource = ServiceInstance;

    async fn acquire(&self) -> Availability<ServiceInstance> {
        self.provision().await
    }

    async fn release(&self) -> anyhow::Result<()> {
        Ok(self.dispose().await?)
    }
}
