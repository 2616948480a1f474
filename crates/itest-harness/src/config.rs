//! Environment lookups shared by the harness and fixtures.

use std::time::Duration;

use tracing::warn;

/// Non-empty, trimmed value of `name`.
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `1`, `true` or `yes` (any case) turn a flag on; anything else is off.
pub fn env_flag(name: &str) -> bool {
    env_string(name)
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Whole seconds from `name`, falling back to `default` when unset or
/// malformed.
pub fn env_secs(name: &str, default: Duration) -> Duration {
    match env_string(name) {
        None => default,
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!(
                    variable = name,
                    value = %raw,
                    default_secs = default.as_secs(),
                    "Ignoring malformed duration"
                );
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable so parallel tests do not race.

    #[test]
    fn test_env_string_trims_and_drops_empty() {
        std::env::set_var("ITEST_CFG_STRING", "  pure-ftpd ");
        assert_eq!(env_string("ITEST_CFG_STRING").as_deref(), Some("pure-ftpd"));
        std::env::set_var("ITEST_CFG_STRING", "   ");
        assert_eq!(env_string("ITEST_CFG_STRING"), None);
        std::env::remove_var("ITEST_CFG_STRING");
        assert_eq!(env_string("ITEST_CFG_STRING"), None);
    }

    #[test]
    fn test_env_flag() {
        for on in ["1", "true", "YES"] {
            std::env::set_var("ITEST_CFG_FLAG", on);
            assert!(env_flag("ITEST_CFG_FLAG"), "{on} should enable");
        }
        std::env::set_var("ITEST_CFG_FLAG", "off");
        assert!(!env_flag("ITEST_CFG_FLAG"));
        std::env::remove_var("ITEST_CFG_FLAG");
        assert!(!env_flag("ITEST_CFG_FLAG"));
    }

    #[test]
    fn test_env_secs_falls_back_on_garbage() {
        let default = Duration::from_secs(60);
        std::env::set_var("ITEST_CFG_SECS", "15");
        assert_eq!(env_secs("ITEST_CFG_SECS", default), Duration::from_secs(15));
        std::env::set_var("ITEST_CFG_SECS", "soon");
        assert_eq!(env_secs("ITEST_CFG_SECS", default), default);
        std::env::remove_var("ITEST_CFG_SECS");
        assert_eq!(env_secs("ITEST_CFG_SECS", default), default);
    }
}
