//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve config → Init logging/metrics → Connect broker client → Run role
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Producer stops ticking / subscriber drains → Close client → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     Second signal → Forced exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then the broker client
//! - A broker that cannot be reached at startup is fatal
//! - Records already pulled are rendered before exit

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{start_consumer, start_demo, start_producer};
