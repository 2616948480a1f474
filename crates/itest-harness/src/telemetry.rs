//! Logging for suite binaries.
//!
//! Log lines go to stderr so the per-case result lines on stdout stay
//! readable. Without `RUST_LOG`, only the suite crates log at the requested
//! level; dependencies are held at `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::session::SessionConfig;

/// Crates whose events follow the requested level by default.
pub const SUITE_TARGETS: [&str; 4] = [
    "itest_harness",
    "itest_fixture",
    "ftp_itest",
    "ftp_integration",
];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(SUITE_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber for a session.
///
/// JSON output follows [`SessionConfig::json_logs`]. Returns `false` when a
/// subscriber was already installed, which leaves that one in place.
pub fn init_tracing(config: &SessionConfig, level: Level) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json_logs {
        registry
            .with(layer.json().flatten_event(true).with_current_span(false))
            .try_init()
    } else {
        registry.with(layer.compact()).try_init()
    };
    installed.is_ok()
}
