//! Catalog of provisionable FTP servers.
//!
//! A [`ServiceSpec`] is a plain value: image, fixed container name, port
//! bindings, environment and readiness predicate. It is built once by the
//! per-kind constructors and never mutated afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// The control port every catalog entry exposes.
pub const PRIMARY_PORT: u16 = 21;

/// Known server kinds, selected by their key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    PureFtpd,
    Vsftpd,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 2] = [ServiceKind::PureFtpd, ServiceKind::Vsftpd];

    /// Exact match against the selection keys.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    pub fn key(&self) -> &'static str {
        match self {
            ServiceKind::PureFtpd => "pure-ftpd",
            ServiceKind::Vsftpd => "vsftpd",
        }
    }

    pub fn image(&self) -> &'static str {
        match self {
            ServiceKind::PureFtpd => "stilliard/pure-ftpd",
            ServiceKind::Vsftpd => "fauria/vsftpd",
        }
    }

    pub fn container_name(&self) -> &'static str {
        self.key()
    }

    /// Comma-separated keys, for messages.
    pub fn known_keys() -> String {
        Self::ALL
            .iter()
            .map(ServiceKind::key)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// FTP login, bound to one provisioned instance.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("bob", "12345")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Condition deciding that a started service is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Readiness {
    /// A TCP connection to the port succeeds and is not closed right away.
    PortAcceptsConnection { port: u16 },
}

impl Readiness {
    pub fn port(&self) -> u16 {
        match self {
            Readiness::PortAcceptsConnection { port } => *port,
        }
    }
}

/// Immutable description of one containerized service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    kind: ServiceKind,
    image: String,
    container_name: String,
    ports: BTreeSet<u16>,
    env: BTreeMap<String, String>,
    readiness: Readiness,
    credentials: Credentials,
}

impl ServiceSpec {
    /// A bare spec for `kind`: catalog image and name, no ports, no env,
    /// readiness on [`PRIMARY_PORT`].
    pub fn new(kind: ServiceKind, credentials: Credentials) -> Self {
        Self {
            kind,
            image: kind.image().to_string(),
            container_name: kind.container_name().to_string(),
            ports: BTreeSet::new(),
            env: BTreeMap::new(),
            readiness: Readiness::PortAcceptsConnection { port: PRIMARY_PORT },
            credentials,
        }
    }

    /// pure-ftpd: control port plus passive range 30000-30009.
    pub fn pure_ftpd(credentials: Credentials) -> Self {
        let home = format!("/home/{}", credentials.username());
        let user = credentials.username().to_string();
        let pass = credentials.password().to_string();

        Self::new(ServiceKind::PureFtpd, credentials)
            .with_ports([PRIMARY_PORT])
            .with_ports(30000..=30009)
            .with_env("FTP_USER_NAME", user)
            .with_env("FTP_USER_PASS", pass)
            .with_env("FTP_USER_HOME", home)
    }

    /// vsftpd: ports 20 and 21 plus passive range 21100-21110.
    pub fn vsftpd(credentials: Credentials) -> Self {
        let user = credentials.username().to_string();
        let pass = credentials.password().to_string();

        Self::new(ServiceKind::Vsftpd, credentials)
            .with_ports([20, PRIMARY_PORT])
            .with_ports(21100..=21110)
            .with_env("PASV_ADDRESS", "127.0.0.1")
            .with_env("FTP_USER", user)
            .with_env("FTP_PASS", pass)
    }

    pub fn for_kind(kind: ServiceKind, credentials: Credentials) -> Self {
        match kind {
            ServiceKind::PureFtpd => Self::pure_ftpd(credentials),
            ServiceKind::Vsftpd => Self::vsftpd(credentials),
        }
    }

    /// Resolve a selection key; `None` when absent or unknown.
    pub fn resolve(key: Option<&str>, credentials: &Credentials) -> Option<Self> {
        key.and_then(ServiceKind::from_key)
            .map(|kind| Self::for_kind(kind, credentials.clone()))
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports.extend(ports);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn ports(&self) -> &BTreeSet<u16> {
        &self.ports
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    /// Port clients connect to; the one the readiness predicate watches.
    pub fn primary_port(&self) -> u16 {
        self.readiness.port()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}
