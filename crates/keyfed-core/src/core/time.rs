// crates/keyfed-core/src/core/time.rs
// ============================================================================
// Module: Keyfed Time Model
// Description: Canonical timestamps, clock abstraction, and interval math.
// Purpose: Keep engine runs deterministic by threading time explicitly.
// Dependencies: serde, std
// ============================================================================

//! ## Overview
//! The engine never reads wall-clock time ambiently. Callers supply a
//! [`Clock`], and every stored or transmitted instant is a [`Timestamp`] in
//! unix seconds (UTC). Exposure records address time as 10-minute interval
//! indexes counted from the unix epoch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Seconds in one exposure rolling interval.
pub const ROLLING_INTERVAL_SECONDS: i64 = 600;
/// Seconds in one calendar day.
pub const SECONDS_PER_DAY: i64 = 86_400;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Instant in unix seconds (UTC).
///
/// # Invariants
/// - Values are explicitly provided by callers; the engine never reads
///   wall-clock time directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix seconds.
    #[must_use]
    pub const fn from_unix_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    /// Returns the timestamp as unix seconds.
    #[must_use]
    pub const fn unix_seconds(self) -> i64 {
        self.0
    }

    /// Returns the 10-minute interval index for this instant, or `None` for
    /// instants before the unix epoch or beyond the interval range.
    #[must_use]
    pub fn rolling_interval(self) -> Option<u32> {
        if self.0 < 0 {
            return None;
        }
        u32::try_from(self.0 / ROLLING_INTERVAL_SECONDS).ok()
    }

    /// Returns this instant moved back by the given number of whole days.
    #[must_use]
    pub const fn minus_days(self, days: u32) -> Self {
        Self(self.0.saturating_sub(days as i64 * SECONDS_PER_DAY))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of the current instant for an engine run.
pub trait Clock {
    /// Returns the current instant.
    fn now(&self) -> Timestamp;
}

/// Wall-clock backed [`Clock`] for production hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX));
        Timestamp::from_unix_seconds(seconds)
    }
}

/// Fixed [`Clock`] for deterministic runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(Timestamp);

impl FixedClock {
    /// Creates a clock pinned to the given instant.
    #[must_use]
    pub const fn new(now: Timestamp) -> Self {
        Self(now)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
