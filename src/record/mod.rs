//! Log records and their wire encoding.

pub mod codec;
pub mod entry;

pub use codec::{decode, encode};
pub use entry::{LogEntry, LogLevel};
