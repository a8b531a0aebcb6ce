//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Publish:
//!     → retries.rs (budget handed to the broker client)
//!
//! Group session lost:
//!     → backoff.rs (exponential delay with jitter before rejoining)
//! ```
//!
//! # Design Decisions
//! - The broker client owns publish retries; they are configured, not reimplemented
//! - Rejoin delays grow exponentially and reset after a successful join

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::RetryPolicy;
