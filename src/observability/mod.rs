//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Producer loop, subscriber, broker clients produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → Log aggregation (stderr, JSON optional)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (application, partition, offset) on every pipeline event
//! - Metrics are cheap counters and no-ops when the exporter is off

pub mod logging;
pub mod metrics;
