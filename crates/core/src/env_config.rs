//! Environment variable parsing with warn-level logging for invalid values.

use std::time::Duration;

use crate::{DEFAULT_SYNC_CALL_TIMEOUT_SECS, DEFAULT_THREAD_IDLE_SECS};

/// Timeout for one synchronizer round-trip, in seconds.
pub const ENV_SYNC_TIMEOUT_SECS: &str = "ANALYSIS_CONSOLE_SYNC_TIMEOUT_SECS";

/// Idle time after which a fully synced thread mirror is dropped, in seconds.
pub const ENV_THREAD_IDLE_SECS: &str = "ANALYSIS_CONSOLE_THREAD_IDLE_SECS";

/// Parse an environment variable with a default fallback.
///
/// - If the variable is not set: returns `default` silently (expected case).
/// - If the variable is set but cannot be parsed: logs a warning and returns `default`.
pub fn env_parse_with_default<T: std::str::FromStr + std::fmt::Display>(
    var: &str,
    default: T,
) -> T {
    match std::env::var(var) {
        Ok(v) => match v.trim().parse() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(
                    var,
                    value = %v,
                    default = %default,
                    "invalid env var value, using default"
                );
                default
            },
        },
        Err(_) => default,
    }
}

/// Read an environment variable, treating blank values as unset.
#[must_use]
pub fn env_non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

/// Per-call timeout used by the thread synchronizer.
///
/// Zero is rejected (it would fail every call) and falls back to the default.
#[must_use]
pub fn sync_call_timeout() -> Duration {
    let secs = env_parse_with_default(ENV_SYNC_TIMEOUT_SECS, DEFAULT_SYNC_CALL_TIMEOUT_SECS);
    if secs == 0 {
        tracing::warn!(var = ENV_SYNC_TIMEOUT_SECS, "zero timeout not allowed, using default");
        return Duration::from_secs(DEFAULT_SYNC_CALL_TIMEOUT_SECS);
    }
    Duration::from_secs(secs)
}

/// Idle window for thread mirror eviction. `None` (set to 0) keeps mirrors
/// until they are detached.
#[must_use]
pub fn thread_idle_timeout() -> Option<Duration> {
    let secs = env_parse_with_default(ENV_THREAD_IDLE_SECS, DEFAULT_THREAD_IDLE_SECS);
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    // SAFETY (all tests below): each test touches a variable name no other test reads.
    fn set(var: &str, value: &str) {
        unsafe { std::env::set_var(var, value) };
    }

    fn unset(var: &str) {
        unsafe { std::env::remove_var(var) };
    }

    #[test]
    fn test_env_parse_valid_value() {
        let var_name = "TEST_CONSOLE_ENV_PARSE_VALID_41207";
        set(var_name, " 42 ");
        let result: u32 = env_parse_with_default(var_name, 10);
        assert_eq!(result, 42);
        unset(var_name);
    }

    #[test]
    fn test_env_parse_invalid_value() {
        let var_name = "TEST_CONSOLE_ENV_PARSE_INVALID_41208";
        set(var_name, "banana");
        let result: u32 = env_parse_with_default(var_name, 10);
        assert_eq!(result, 10);
        unset(var_name);
    }

    #[test]
    fn test_env_parse_missing_var() {
        let var_name = "TEST_CONSOLE_ENV_PARSE_MISSING_41209";
        unset(var_name);
        let result: u32 = env_parse_with_default(var_name, 10);
        assert_eq!(result, 10);
    }

    #[test]
    fn test_env_non_empty_blank_is_none() {
        let var_name = "TEST_CONSOLE_ENV_NON_EMPTY_41210";
        set(var_name, "   ");
        assert!(env_non_empty(var_name).is_none());
        set(var_name, " postgres://db ");
        assert_eq!(env_non_empty(var_name).as_deref(), Some("postgres://db"));
        unset(var_name);
    }

    #[test]
    fn test_thread_idle_timeout_zero_disables() {
        set(ENV_THREAD_IDLE_SECS, "0");
        assert_eq!(thread_idle_timeout(), None);
        set(ENV_THREAD_IDLE_SECS, "90");
        assert_eq!(thread_idle_timeout(), Some(Duration::from_secs(90)));
        unset(ENV_THREAD_IDLE_SECS);
        assert_eq!(thread_idle_timeout(), Some(Duration::from_secs(DEFAULT_THREAD_IDLE_SECS)));
    }
}
