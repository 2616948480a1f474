//! Provisioner configuration.

use std::time::Duration;

use itest_harness::config::{env_secs, env_string};

use crate::spec::Credentials;

/// Selects the server kind; unset means the suite is skipped.
pub const SERVER_KEY_ENV: &str = "FTP_ITEST_SERVER_KEY";

/// Everything the provisioner needs to know before it starts.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub server_key: Option<String>,
    pub credentials: Credentials,
    /// Host the published ports are reachable on.
    pub host: String,
    pub readiness_timeout: Duration,
    pub poll_interval: Duration,
    pub docker_binary: String,
    /// Limit for each docker command; image pulls happen inside `create`.
    pub docker_timeout: Duration,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            server_key: None,
            credentials: Credentials::default(),
            host: "localhost".to_string(),
            readiness_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            docker_binary: "docker".to_string(),
            docker_timeout: Duration::from_secs(300),
        }
    }
}

impl FixtureConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - FTP_ITEST_SERVER_KEY (optional; `pure-ftpd` or `vsftpd`)
    /// - FTP_ITEST_USER (optional, default: "bob")
    /// - FTP_ITEST_PASSWORD (optional, default: "12345")
    /// - FTP_ITEST_HOST (optional, default: "localhost")
    /// - FTP_ITEST_READY_TIMEOUT_SECS (optional, default: 60)
    /// - FTP_ITEST_DOCKER (optional, default: "docker")
    /// - FTP_ITEST_DOCKER_TIMEOUT_SECS (optional, default: 300)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let credentials = Credentials::new(
            env_string("FTP_ITEST_USER").unwrap_or_else(|| defaults.credentials.username().into()),
            env_string("FTP_ITEST_PASSWORD")
                .unwrap_or_else(|| defaults.credentials.password().into()),
        );

        Self {
            server_key: env_string(SERVER_KEY_ENV),
            credentials,
            host: env_string("FTP_ITEST_HOST").unwrap_or(defaults.host),
            readiness_timeout: env_secs("FTP_ITEST_READY_TIMEOUT_SECS", defaults.readiness_timeout),
            poll_interval: defaults.poll_interval,
            docker_binary: env_string("FTP_ITEST_DOCKER").unwrap_or(defaults.docker_binary),
            docker_timeout: env_secs("FTP_ITEST_DOCKER_TIMEOUT_SECS", defaults.docker_timeout),
        }
    }

    pub fn with_server_key(mut self, key: Option<&str>) -> Self {
        self.server_key = key.map(str::to_string);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_docker_binary(mut self, binary: impl Into<String>) -> Self {
        self.docker_binary = binary.into();
        self
    }

    pub fn with_docker_timeout(mut self, timeout: Duration) -> Self {
        self.docker_timeout = timeout;
        self
    }
}
