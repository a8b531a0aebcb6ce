//! JSON codec for log entries.
//!
//! Field names are preserved on the wire:
//! `{"timestamp":"2024-05-01T10:15:00.123Z","application":"AuthService","level":"WARN","message":"..."}`

use crate::error::{PipelineError, Result};
use crate::record::LogEntry;

/// Encode an entry as a JSON object.
pub fn encode(entry: &LogEntry) -> Result<Vec<u8>> {
    serde_json::to_vec(entry).map_err(PipelineError::Encode)
}

/// Decode an entry from a JSON payload.
///
/// Invalid JSON, truncated input, missing fields and unknown levels all
/// yield [`PipelineError::MalformedRecord`].
pub fn decode(payload: &[u8]) -> Result<LogEntry> {
    serde_json::from_slice(payload).map_err(|e| PipelineError::MalformedRecord(e.to_string()))
}
