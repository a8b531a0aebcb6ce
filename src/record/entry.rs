//! The log record and its severity levels.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log entry.
///
/// The set is closed: an unrecognized level on the wire is a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// All levels, lowest severity first.
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    /// Wire and display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured log record emitted by a simulated application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub application: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with `timestamp` truncated to milliseconds,
    /// the precision the broker keeps for message timestamps.
    pub fn new(
        timestamp: DateTime<Utc>,
        application: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(3),
            application: application.into(),
            level,
            message: message.into(),
        }
    }

    /// Key routing the entry to a partition: all entries of one application
    /// share a partition and stay ordered.
    pub fn partition_key(&self) -> &str {
        &self.application
    }

    /// Timestamp in milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_display_matches_wire_label() {
        for level in LogLevel::ALL {
            let wire = serde_json::to_string(&level).unwrap();
            assert_eq!(wire, format!("\"{level}\""));
            assert_eq!(level.to_string(), level.as_str());
        }
    }

    #[test]
    fn test_wire_labels_are_case_sensitive() {
        assert!(serde_json::from_str::<LogLevel>("\"TRACE\"").is_err());
        assert!(serde_json::from_str::<LogLevel>("\"info\"").is_err());
        assert_eq!(serde_json::from_str::<LogLevel>("\"INFO\"").unwrap(), LogLevel::Info);
    }

    #[test]
    fn test_new_truncates_to_millis() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let entry = LogEntry::new(ts, "AuthService", LogLevel::Warn, "High Memory usage");

        assert_eq!(entry.timestamp.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(entry.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(entry.partition_key(), "AuthService");
    }
}
