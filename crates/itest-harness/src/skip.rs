//! Session skip state and the in-body skip signal.
//!
//! Two ways a case ends up skipped:
//! - statically, when [`SkipState`] already carries a reason before the case
//!   starts (the runner never invokes the body)
//! - dynamically, when the body hands back a [`SkipRequested`] (as an error or
//!   as a panic payload) and the interceptor reclassifies the failure

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Once, OnceLock};

use thiserror::Error;
use tracing::warn;

/// Reason reported for cases that would start after teardown began.
pub const TEARDOWN_REASON: &str = "session teardown has begun";

/// Session-scoped skip signal shared by every case of a session.
///
/// Starts out as "not skipping". The first reason set wins and is never
/// reset for the rest of the session.
#[derive(Debug, Default)]
pub struct SkipState {
    reason: OnceLock<String>,
    closed: AtomicBool,
}

impl SkipState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every case that has not started yet as skipped.
    ///
    /// Returns `true` if this call set the reason, `false` if one was
    /// already in place.
    pub fn skip_all(&self, reason: impl Into<String>) -> bool {
        match self.reason.set(reason.into()) {
            Ok(()) => {
                warn!(
                    reason = self.reason().unwrap_or_default(),
                    "Skipping all remaining cases"
                );
                true
            }
            Err(_) => false,
        }
    }

    /// Checked once per case (per row) before the body is invoked.
    pub fn should_skip_before_start(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    /// Teardown has begun: nothing may start a body from here on.
    pub fn close(&self) {
        let _ = self.reason.set(TEARDOWN_REASON.to_string());
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Distinguished marker a running case uses to ask to be skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("skip requested: {reason}")]
pub struct SkipRequested {
    reason: String,
}

impl SkipRequested {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Unwind out of the running case with this request as the panic payload.
    ///
    /// Useful from helpers that do not return a `Result`.
    pub fn raise(self) -> ! {
        std::panic::panic_any(self)
    }
}

static SKIP_PANIC_HOOK: Once = Once::new();

/// Keep the default panic printout for real panics only.
///
/// A [`SkipRequested`] payload is an expected control-flow signal and would
/// otherwise print a scary "panicked at" line for every dynamically skipped
/// case.
pub fn install_skip_panic_hook() {
    SKIP_PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<SkipRequested>().is_none() {
                previous(info);
            }
        }));
    });
}
