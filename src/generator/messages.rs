//! Fixed message pools, keyed by level.

use crate::record::LogLevel;

const INFO: &[&str] = &[
    "User logged in successfully",
    "data Retrieved successfully",
    "Service Started",
    "Request completed",
];

const WARN: &[&str] = &[
    "Slow Database query",
    "High Memory usage",
    "Connection Pool almost full",
    "Password failed for user",
    "Unauthenticated user trying to access data",
];

const ERROR: &[&str] = &[
    "Database Connection Failed",
    "Invalid user credentials",
    "Backup Database not responding",
    "Service Unavailable",
    "Request Timeout",
];

const DEBUG: &[&str] = &["debug trace information"];

/// Messages a generated entry of `level` is drawn from.
///
/// `Fatal` has no pool: the level policy never generates it, so the level
/// only ever arrives from other producers.
pub fn pool(level: LogLevel) -> &'static [&'static str] {
    match level {
        LogLevel::Debug => DEBUG,
        LogLevel::Info => INFO,
        LogLevel::Warn => WARN,
        LogLevel::Error => ERROR,
        LogLevel::Fatal => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_levels_have_messages() {
        for level in LogLevel::ALL {
            assert_eq!(pool(level).is_empty(), level == LogLevel::Fatal, "{level}");
        }
    }

    #[test]
    fn test_pool_text_is_kept_verbatim() {
        assert!(pool(LogLevel::Warn).contains(&"Slow Database query"));
        assert_eq!(pool(LogLevel::Debug), ["debug trace information"]);
    }
}
