//! Synthetic log generation for one simulated application.
//!
//! # Level policy
//! ```text
//! roll in [0.00, 0.60) → INFO
//! roll in [0.60, 0.80) → WARN
//! roll in [0.80, 0.95) → ERROR
//! roll in [0.95, 1.00) → DEBUG
//! ```
//! FATAL is a valid level but this policy never produces it.
//!
//! The random source is injected so tests can seed it.

pub mod messages;

use std::ops::RangeInclusive;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::record::{LogEntry, LogLevel};

/// Map a uniform roll in `[0, 1)` to a level.
pub fn pick_level(roll: f64) -> LogLevel {
    match roll {
        r if r < 0.60 => LogLevel::Info,
        r if r < 0.80 => LogLevel::Warn,
        r if r < 0.95 => LogLevel::Error,
        _ => LogLevel::Debug,
    }
}

/// Build the random source: seeded when a seed is configured, from OS
/// entropy otherwise.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Pick the simulated application a producer runs as.
pub fn choose_application<'a, R: Rng + ?Sized>(rng: &mut R, names: &'a [String]) -> Option<&'a str> {
    names.choose(rng).map(String::as_str)
}

/// Produces log entries for one application at a fixed, randomly chosen interval.
#[derive(Debug)]
pub struct Generator<R> {
    application: String,
    rng: R,
    interval: Duration,
}

impl<R: Rng> Generator<R> {
    /// Create a generator. The tick interval is drawn once, uniformly in
    /// whole seconds from `interval_secs`.
    pub fn new(application: impl Into<String>, mut rng: R, interval_secs: RangeInclusive<u64>) -> Self {
        let secs = rng.gen_range(interval_secs);
        Self {
            application: application.into(),
            rng,
            interval: Duration::from_secs(secs),
        }
    }

    /// Application this generator simulates.
    pub fn application(&self) -> &str {
        &self.application
    }

    /// Time between two generated entries.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Generate an entry stamped with the current time.
    pub fn next_entry(&mut self) -> LogEntry {
        self.next_entry_at(Utc::now())
    }

    /// Generate an entry stamped with `now`.
    pub fn next_entry_at(&mut self, now: DateTime<Utc>) -> LogEntry {
        let level = pick_level(self.rng.gen::<f64>());
        let message = messages::pool(level)
            .choose(&mut self.rng)
            .copied()
            .unwrap_or_default();

        LogEntry::new(now, self.application.as_str(), level, message)
    }
}
