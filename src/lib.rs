//! Distributed log pipeline over a partitioned broker topic.

// Data model
pub mod error;
pub mod record;

// Pipeline roles
pub mod generator;
pub mod publisher;
pub mod subscriber;

// Broker clients
pub mod broker;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::PipelineConfig;
pub use error::{PipelineError, Result};
pub use lifecycle::Shutdown;
pub use record::{LogEntry, LogLevel};
