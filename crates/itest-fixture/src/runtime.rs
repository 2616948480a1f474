//! Container runtime seam and the Docker CLI implementation.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{FixtureError, Result};
use crate::spec::ServiceSpec;

/// Identifier the runtime hands back for a created container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Docker ids are 64 hex chars; the short form is what `docker ps` shows.
        f.write_str(self.0.get(..12).unwrap_or(&self.0))
    }
}

/// What the provisioner needs from a container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create (but do not start) a container for `spec`.
    async fn create(&self, spec: &ServiceSpec) -> Result<ContainerId>;

    async fn start(&self, id: &ContainerId) -> Result<()>;

    /// Force-remove a container, running or not.
    async fn remove(&self, id: &ContainerId) -> Result<()>;

    /// Remove the container that holds `name`, if there is one. A missing
    /// container is not an error.
    async fn remove_stale(&self, name: &str) -> Result<()>;
}

/// Drives the `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    timeout: Duration,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Arguments for `docker create`.
    pub fn create_args(spec: &ServiceSpec) -> Vec<String> {
        let mut args = vec![
            "create".to_string(),
            "--name".to_string(),
            spec.container_name().to_string(),
        ];
        for port in spec.ports() {
            args.push("-p".to_string());
            args.push(format!("{port}:{port}"));
        }
        for (key, value) in spec.env() {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(spec.image().to_string());
        args
    }

    /// Run one docker subcommand and return its trimmed stdout.
    async fn run(&self, args: Vec<String>) -> Result<String> {
        // Only the subcommand goes into errors and logs; `-e` values carry
        // the FTP password.
        let command = format!(
            "{} {}",
            self.binary,
            args.first().map(String::as_str).unwrap_or_default()
        );
        debug!(%command, argc = args.len(), "Running container command");

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| FixtureError::CommandTimedOut {
                command: command.clone(),
                secs: self.timeout.as_secs(),
            })??;

        if !output.status.success() {
            return Err(FixtureError::CommandFailed {
                command,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn create(&self, spec: &ServiceSpec) -> Result<ContainerId> {
        let stdout = self.run(Self::create_args(spec)).await?;
        // `docker create` may print pull progress before the id.
        let id = stdout.lines().last().unwrap_or_default().trim();
        Ok(ContainerId::new(id))
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        self.run(vec!["start".to_string(), id.as_str().to_string()])
            .await
            .map(|_| ())
    }

    async fn remove(&self, id: &ContainerId) -> Result<()> {
        self.run(vec![
            "rm".to_string(),
            "-f".to_string(),
            id.as_str().to_string(),
        ])
        .await
        .map(|_| ())
    }

    async fn remove_stale(&self, name: &str) -> Result<()> {
        match self
            .run(vec!["rm".to_string(), "-f".to_string(), name.to_string()])
            .await
        {
            Err(err) if is_missing_container(&err) => {
                debug!(name, "No container to remove");
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }
}

/// Older engines fail `rm -f` on an unknown name instead of ignoring it.
fn is_missing_container(err: &FixtureError) -> bool {
    matches!(
        err,
        FixtureError::CommandFailed { stderr, .. } if stderr.contains("No such container")
    )
}
