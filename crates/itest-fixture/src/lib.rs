//! Env-gated provisioning of a containerized FTP server.
//!
//! The [`Provisioner`] reads `FTP_ITEST_SERVER_KEY`, starts the matching
//! container, waits for its control port and hands the session a
//! [`ServiceInstance`]. Without a key it reports unavailable and nothing is
//! spawned.

pub mod config;
pub mod error;
pub mod fakes;
pub mod provisioner;
pub mod readiness;
pub mod runtime;
pub mod spec;

pub use config::{FixtureConfig, SERVER_KEY_ENV};
pub use error::{FixtureError, Result};
pub use provisioner::{
    Endpoint, ProvisionState, Provisioner, ServiceInstance, SpecResolver, DISPOSED_REASON,
};
pub use runtime::{ContainerId, ContainerRuntime, DockerCli};
pub use spec::{Credentials, Readiness, ServiceKind, ServiceSpec, PRIMARY_PORT};
