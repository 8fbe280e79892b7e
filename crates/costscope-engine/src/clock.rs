//! Clock abstraction for deterministic timestamps.
//!
//! The engine stamps every cost record and summary with a `calculated_at`
//! time. Reading the system clock directly would make calculation output
//! non-reproducible, so the calculator takes a [`Clock`] and tests inject
//! a [`FixedClock`] to pin timestamps. Production callers use
//! [`SystemClock`].

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// The engine reads the clock exactly once per calculated record and once
/// per generated summary; everything else derives timestamps from input
/// data.
pub trait Clock: Send + Sync + core::fmt::Debug {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that always returns the same instant.
///
/// Used in tests to make `calculated_at` and `generated_at` fields exactly
/// reproducible.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    /// Create a clock pinned to the given instant.
    pub const fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}
